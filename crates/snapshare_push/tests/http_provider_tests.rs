//! Tests for the HTTP push gateway client against a mock gateway

use std::collections::HashMap;

use serde_json::json;
use snapshare_common::Platform;
use snapshare_config::PushConfig;
use snapshare_push::{EndpointAttributes, HttpPushProvider, ProviderFailure, PushProvider};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config(base_url: String) -> PushConfig {
    PushConfig {
        base_url,
        api_key: Some("test-key".to_string()),
        ios_application: "app/APNS/snapshare-test".to_string(),
        android_application: "app/GCM/snapshare-test".to_string(),
        topics: HashMap::new(),
    }
}

#[tokio::test]
async fn test_create_endpoint_posts_application_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/endpoints"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_json(json!({
            "application": "app/APNS/snapshare-test",
            "token": "device-1",
            "custom_user_data": "42"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "endpoint_id": "ep-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpPushProvider::new(create_test_config(format!("{}/v1", server.uri())));
    let endpoint = provider
        .create_endpoint(Platform::Ios, "device-1", Some("42"))
        .await
        .expect("endpoint should be created");

    assert_eq!(endpoint, "ep-1");
}

#[tokio::test]
async fn test_gateway_conflict_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/endpoints"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "InvalidParameter",
            "message": "Invalid parameter: Token Reason: Endpoint ep-7 already exists with the same Token, but different attributes."
        })))
        .mount(&server)
        .await;

    let provider = HttpPushProvider::new(create_test_config(format!("{}/v1", server.uri())));
    let err = provider
        .create_endpoint(Platform::Android, "device-1", None)
        .await
        .unwrap_err();

    assert_eq!(err.code.as_deref(), Some("InvalidParameter"));
    assert_eq!(
        err.classify(),
        ProviderFailure::Conflict {
            existing_endpoint: "ep-7".to_string()
        }
    );
}

#[tokio::test]
async fn test_missing_endpoint_on_attribute_update() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/endpoints/ep-1/attributes"))
        .and(body_json(json!({ "enabled": true, "token": "device-2" })))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "NotFound",
            "message": "Endpoint does not exist"
        })))
        .mount(&server)
        .await;

    let provider = HttpPushProvider::new(create_test_config(format!("{}/v1", server.uri())));
    let attributes = EndpointAttributes {
        enabled: true,
        token: "device-2".to_string(),
        custom_user_data: None,
    };
    let err = provider
        .set_endpoint_attributes("ep-1", &attributes)
        .await
        .unwrap_err();

    assert_eq!(err.classify(), ProviderFailure::EndpointMissing);
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/subscriptions"))
        .and(body_json(json!({ "topic": "topic/comments", "endpoint_id": "ep-1" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "subscription_id": "sub-1" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/subscriptions/sub-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpPushProvider::new(create_test_config(format!("{}/v1", server.uri())));
    let subscription = provider.subscribe("topic/comments", "ep-1").await.unwrap();
    assert_eq!(subscription, "sub-1");

    provider.unsubscribe(&subscription).await.unwrap();
}

#[tokio::test]
async fn test_non_json_error_keeps_status_as_code() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/endpoints/ep-1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let provider = HttpPushProvider::new(create_test_config(format!("{}/v1", server.uri())));
    let err = provider.delete_endpoint("ep-1").await.unwrap_err();

    assert_eq!(err.code.as_deref(), Some("503"));
    assert_eq!(err.message, "upstream unavailable");
    assert_eq!(err.classify(), ProviderFailure::Fatal);
}
