//! HTTP push gateway client
//!
//! This module provides a `PushProvider` that talks JSON to a push gateway
//! sitting in front of the actual notification service. The gateway exposes
//! endpoints and subscriptions as plain REST resources:
//!
//! - `POST   {base}/endpoints`                  -> `{"endpoint_id": ".."}`
//! - `PUT    {base}/endpoints/{id}/attributes`
//! - `DELETE {base}/endpoints/{id}`
//! - `POST   {base}/subscriptions`              -> `{"subscription_id": ".."}`
//! - `DELETE {base}/subscriptions/{id}`
//!
//! Failed calls answer with `{"code": "..", "message": ".."}`, which becomes a
//! `ProviderError` that the saga classifies.

use reqwest::{Client, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use snapshare_common::{BoxFuture, Platform};
use snapshare_config::{PushConfig, SECRET_FROM_ENV};
use tracing::{debug, error};

use crate::error::ProviderError;
use crate::provider::{EndpointAttributes, PushProvider};

#[derive(Debug, Serialize)]
struct CreateEndpointRequest<'a> {
    application: &'a str,
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_user_data: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateEndpointResponse {
    endpoint_id: String,
}

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    topic: &'a str,
    endpoint_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubscribeResponse {
    subscription_id: String,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    code: Option<String>,
    message: String,
}

/// Client for a JSON push gateway
pub struct HttpPushProvider {
    /// HTTP client for making requests to the gateway
    client: Client,

    /// Gateway location, credentials and platform applications
    config: PushConfig,
}

impl HttpPushProvider {
    /// Creates a new gateway client with the given configuration
    pub fn new(config: PushConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Build a gateway URL; each segment is percent-encoded, so provider ids
    /// containing `/` or `:` stay a single path segment.
    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| ProviderError::opaque(format!("invalid push gateway url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::opaque("push gateway url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn application_for(&self, platform: Platform) -> &str {
        match platform {
            Platform::Ios => &self.config.ios_application,
            Platform::Android => &self.config.android_application,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        // An unresolved secret marker means no key was provided
        match self
            .config
            .api_key
            .as_deref()
            .filter(|key| *key != SECRET_FROM_ENV)
        {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Send a request and return the raw success body.
    async fn send(&self, request: RequestBuilder) -> Result<String, ProviderError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        error!("Push gateway answered {}: {}", status, body);
        Err(match serde_json::from_str::<GatewayError>(&body) {
            Ok(gateway_error) => ProviderError {
                code: gateway_error.code,
                message: gateway_error.message,
            },
            Err(_) => ProviderError::new(status.as_u16().to_string(), body),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::opaque(format!("unexpected push gateway response: {}", e))
        })
    }
}

impl PushProvider for HttpPushProvider {
    fn create_endpoint(
        &self,
        platform: Platform,
        token: &str,
        custom_user_data: Option<&str>,
    ) -> BoxFuture<'_, String, ProviderError> {
        let token = token.to_string();
        let custom_user_data = custom_user_data.map(str::to_string);

        Box::pin(async move {
            debug!("Creating {} endpoint", platform);
            let payload = CreateEndpointRequest {
                application: self.application_for(platform),
                token: &token,
                custom_user_data: custom_user_data.as_deref(),
            };
            let request = self.client.post(self.url(&["endpoints"])?).json(&payload);
            let response: CreateEndpointResponse = self.send_json(request).await?;
            Ok(response.endpoint_id)
        })
    }

    fn set_endpoint_attributes(
        &self,
        endpoint_id: &str,
        attributes: &EndpointAttributes,
    ) -> BoxFuture<'_, (), ProviderError> {
        let endpoint_id = endpoint_id.to_string();
        let attributes = attributes.clone();

        Box::pin(async move {
            let url = self.url(&["endpoints", &endpoint_id, "attributes"])?;
            self.send(self.client.put(url).json(&attributes)).await?;
            Ok(())
        })
    }

    fn delete_endpoint(&self, endpoint_id: &str) -> BoxFuture<'_, (), ProviderError> {
        let endpoint_id = endpoint_id.to_string();

        Box::pin(async move {
            let url = self.url(&["endpoints", &endpoint_id])?;
            self.send(self.client.delete(url)).await?;
            Ok(())
        })
    }

    fn subscribe(&self, topic: &str, endpoint_id: &str) -> BoxFuture<'_, String, ProviderError> {
        let topic = topic.to_string();
        let endpoint_id = endpoint_id.to_string();

        Box::pin(async move {
            let payload = SubscribeRequest {
                topic: &topic,
                endpoint_id: &endpoint_id,
            };
            let request = self.client.post(self.url(&["subscriptions"])?).json(&payload);
            let response: SubscribeResponse = self.send_json(request).await?;
            Ok(response.subscription_id)
        })
    }

    fn unsubscribe(&self, subscription_id: &str) -> BoxFuture<'_, (), ProviderError> {
        let subscription_id = subscription_id.to_string();

        Box::pin(async move {
            let url = self.url(&["subscriptions", &subscription_id])?;
            self.send(self.client.delete(url)).await?;
            Ok(())
        })
    }
}
