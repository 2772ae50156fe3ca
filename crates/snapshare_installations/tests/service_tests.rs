//! Tests of the subscription operations and the service helpers


use fixtures::{setup, USER_A, USER_B};
use snapshare_db::Platform;
use snapshare_installations::{
    InstallationError, InstallationParams, SkipReason, SubscribeOutcome, SubscribeRequest,
    UnsubscribeTarget,
};
use snapshare_push::{Operation, ProviderError};

fn invalid_parameter() -> ProviderError {
    ProviderError::new(
        "InvalidParameter",
        "Invalid parameter: Endpoint Reason: Endpoint is disabled",
    )
}

#[tokio::test]
async fn test_subscribe_with_push_disabled_makes_no_provider_call() {
    let ctx = setup().await;
    let device = ctx
        .upsert_committed(None, &InstallationParams::new(Platform::Ios, "T-quiet"))
        .await
        .unwrap();
    let setting = ctx.create_setting(USER_A, "comments", false).await;

    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx
        .service
        .subscribe(&device, &SubscribeRequest::for_setting(setting), &mut trx)
        .await;
    let outcome = trx.finish(result).await.unwrap();

    assert_eq!(outcome, SubscribeOutcome::Skipped(SkipReason::PushDisabled));
    assert_eq!(ctx.provider.call_count(Operation::Subscribe), 0);
    assert!(ctx.subscriptions_of(device.id).await.is_empty());
}

#[tokio::test]
async fn test_subscribe_needs_setting_or_topic() {
    let ctx = setup().await;
    let device = ctx
        .upsert_committed(None, &InstallationParams::new(Platform::Ios, "T-empty"))
        .await
        .unwrap();

    let mut trx = ctx.service.begin().await.unwrap();
    let err = ctx
        .service
        .subscribe(&device, &SubscribeRequest::default(), &mut trx)
        .await
        .unwrap_err();
    trx.rollback().await.unwrap();

    assert!(matches!(err, InstallationError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_category_without_topic_is_skipped() {
    let ctx = setup().await;
    let device = ctx
        .upsert_committed(None, &InstallationParams::new(Platform::Ios, "T-digest"))
        .await
        .unwrap();
    let digest = ctx.create_setting(USER_A, "digest", true).await;

    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx
        .service
        .subscribe(&device, &SubscribeRequest::for_setting(digest), &mut trx)
        .await;
    let outcome = trx.finish(result).await.unwrap();

    assert_eq!(outcome, SubscribeOutcome::Skipped(SkipReason::NoTopic));
    assert_eq!(ctx.provider.call_count(Operation::Subscribe), 0);
}

#[tokio::test]
async fn test_explicit_topic_writes_no_join_row() {
    let ctx = setup().await;
    let device = ctx
        .upsert_committed(None, &InstallationParams::new(Platform::Android, "T-topic"))
        .await
        .unwrap();

    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx
        .service
        .subscribe(&device, &SubscribeRequest::for_topic("topic/announcements"), &mut trx)
        .await;
    let outcome = trx.finish(result).await.unwrap();

    assert!(outcome.is_subscribed());
    assert!(ctx.subscriptions_of(device.id).await.is_empty());
    let live: Vec<_> = ctx.provider.subscriptions().into_values().collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].topic, "topic/announcements");
}

#[tokio::test]
async fn test_invalid_parameter_on_subscribe_is_soft() {
    let ctx = setup().await;
    let device = ctx
        .upsert_committed(None, &InstallationParams::new(Platform::Ios, "T-disabled"))
        .await
        .unwrap();
    let setting = ctx.create_setting(USER_A, "likes", true).await;
    ctx.provider
        .fail_next(Operation::Subscribe, invalid_parameter());

    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx
        .service
        .subscribe(&device, &SubscribeRequest::for_setting(setting), &mut trx)
        .await;
    let outcome = trx.finish(result).await.unwrap();

    assert_eq!(
        outcome,
        SubscribeOutcome::Skipped(SkipReason::EndpointRejected)
    );
    assert!(ctx.subscriptions_of(device.id).await.is_empty());
}

#[tokio::test]
async fn test_invalid_parameter_on_unsubscribe_still_deletes_row() {
    let ctx = setup().await;
    ctx.create_setting(USER_A, "comments", true).await;
    let device = ctx
        .upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Ios, "T-unsub"))
        .await
        .unwrap();
    let rows = ctx.subscriptions_of(device.id).await;
    assert_eq!(rows.len(), 1);

    ctx.provider
        .fail_next(Operation::Unsubscribe, invalid_parameter());
    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx
        .service
        .unsubscribe(UnsubscribeTarget::Subscription(rows[0].clone()), &mut trx)
        .await;
    let removed = trx.finish(result).await.unwrap();

    assert_eq!(removed, 1);
    assert!(ctx.subscriptions_of(device.id).await.is_empty());
}

#[tokio::test]
async fn test_unsubscribe_lookup_fans_out_across_installations() {
    let ctx = setup().await;
    let comments = ctx.create_setting(USER_A, "comments", true).await;
    let phone = ctx
        .upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Ios, "T-phone"))
        .await
        .unwrap();
    let tablet = ctx
        .upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Android, "T-tablet"))
        .await
        .unwrap();

    let mut trx = ctx.service.begin().await.unwrap();
    let target = UnsubscribeTarget::Lookup {
        installation_ids: vec![phone.id, tablet.id, 9999],
        user_setting_id: comments.id,
    };
    let result = ctx.service.unsubscribe(target, &mut trx).await;
    let removed = trx.finish(result).await.unwrap();

    assert_eq!(removed, 2);
    assert!(ctx.subscriptions_of(phone.id).await.is_empty());
    assert!(ctx.subscriptions_of(tablet.id).await.is_empty());
    assert!(ctx.provider.subscriptions().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_without_rows_is_a_no_op() {
    let ctx = setup().await;

    let mut trx = ctx.service.begin().await.unwrap();
    let target = UnsubscribeTarget::Lookup {
        installation_ids: vec![1, 2],
        user_setting_id: 3,
    };
    let result = ctx.service.unsubscribe(target, &mut trx).await;
    let removed = trx.finish(result).await.unwrap();

    assert_eq!(removed, 0);
    assert!(ctx.provider.calls().is_empty());
}

#[tokio::test]
async fn test_subscribe_many_stops_at_first_failure() {
    let ctx = setup().await;
    let first = ctx
        .upsert_committed(None, &InstallationParams::new(Platform::Ios, "T-m1"))
        .await
        .unwrap();
    let second = ctx
        .upsert_committed(None, &InstallationParams::new(Platform::Ios, "T-m2"))
        .await
        .unwrap();
    let setting = ctx.create_setting(USER_A, "follows", true).await;

    ctx.provider.fail_next(
        Operation::Subscribe,
        ProviderError::new("Throttling", "Rate exceeded"),
    );
    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx
        .service
        .subscribe_many(
            &[first.clone(), second.clone()],
            &SubscribeRequest::for_setting(setting),
            &mut trx,
        )
        .await;
    let err = trx.finish(result).await.unwrap_err();

    assert!(matches!(err, InstallationError::Provider(_)));
    assert_eq!(ctx.provider.call_count(Operation::Subscribe), 1);
    assert!(ctx.subscriptions_of(first.id).await.is_empty());
    assert!(ctx.subscriptions_of(second.id).await.is_empty());
}

#[tokio::test]
async fn test_get_endpoints_for_user() {
    let ctx = setup().await;
    let phone = ctx
        .upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Ios, "T-a1"))
        .await
        .unwrap();
    let tablet = ctx
        .upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Android, "T-a2"))
        .await
        .unwrap();
    ctx.upsert_committed(Some(USER_B), &InstallationParams::new(Platform::Ios, "T-b1"))
        .await
        .unwrap();

    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx.service.get_endpoints_for_user(USER_A, &mut trx).await;
    let endpoints = trx.finish(result).await.unwrap();

    assert_eq!(
        endpoints,
        vec![phone.endpoint_id.unwrap(), tablet.endpoint_id.unwrap()]
    );
}

#[tokio::test]
async fn test_disassociate_clears_only_the_owner() {
    let ctx = setup().await;
    let device = ctx
        .upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Ios, "T-detach"))
        .await
        .unwrap();

    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx.service.disassociate(device.id, &mut trx).await;
    let detached = trx.finish(result).await.unwrap();

    assert!(detached.user_id.is_none());
    assert_eq!(detached.endpoint_id, device.endpoint_id);
    assert_eq!(detached.device_token, "T-detach");

    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx.service.disassociate(9999, &mut trx).await;
    let err = trx.finish(result).await.unwrap_err();
    assert!(matches!(err, InstallationError::NotFound { .. }));
}

#[tokio::test]
async fn test_sync_setting_follows_the_push_flag() {
    let ctx = setup().await;
    let phone = ctx
        .upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Ios, "T-s1"))
        .await
        .unwrap();
    let tablet = ctx
        .upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Android, "T-s2"))
        .await
        .unwrap();
    let likes = ctx.create_setting(USER_A, "likes", true).await;

    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx.service.sync_setting(&likes, &mut trx).await;
    assert_eq!(trx.finish(result).await.unwrap(), 2);
    assert_eq!(ctx.subscriptions_of(phone.id).await.len(), 1);
    assert_eq!(ctx.subscriptions_of(tablet.id).await.len(), 1);

    let disabled = ctx.set_push_enabled(&likes, false).await;
    let mut trx = ctx.service.begin().await.unwrap();
    let result = ctx.service.sync_setting(&disabled, &mut trx).await;
    assert_eq!(trx.finish(result).await.unwrap(), 2);
    assert!(ctx.subscriptions_of(phone.id).await.is_empty());
    assert!(ctx.subscriptions_of(tablet.id).await.is_empty());
    assert!(ctx.provider.subscriptions().is_empty());
}

#[tokio::test]
async fn test_rolled_back_subscribe_drops_the_provider_subscription() {
    let ctx = setup().await;
    let device = ctx
        .upsert_committed(None, &InstallationParams::new(Platform::Ios, "T-undo-sub"))
        .await
        .unwrap();
    let likes = ctx.create_setting(USER_A, "likes", true).await;

    let mut trx = ctx.service.begin().await.unwrap();
    let outcome = ctx
        .service
        .subscribe(&device, &SubscribeRequest::for_setting(likes), &mut trx)
        .await
        .unwrap();
    assert!(outcome.is_subscribed());
    assert_eq!(ctx.provider.subscriptions().len(), 1);
    trx.rollback().await.unwrap();

    assert!(ctx.provider.subscriptions().is_empty());
    assert!(ctx.subscriptions_of(device.id).await.is_empty());
    assert_eq!(ctx.provider.call_count(Operation::Unsubscribe), 1);
    assert!(ctx.sink.reports().is_empty());
}

#[tokio::test]
async fn test_rolled_back_unsubscribe_restores_a_live_subscription() {
    let ctx = setup().await;
    ctx.create_setting(USER_A, "comments", true).await;
    let device = ctx
        .upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Android, "T-undo-unsub"))
        .await
        .unwrap();
    let before = ctx.subscriptions_of(device.id).await;
    assert_eq!(before.len(), 1);

    let mut trx = ctx.service.begin().await.unwrap();
    let removed = ctx
        .service
        .unsubscribe(UnsubscribeTarget::Subscription(before[0].clone()), &mut trx)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(ctx.provider.subscriptions().is_empty());
    trx.rollback().await.unwrap();

    let after = ctx.subscriptions_of(device.id).await;
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, before[0].id);
    assert_ne!(after[0].subscription_id, before[0].subscription_id);

    let live = ctx.provider.subscriptions();
    assert_eq!(live.len(), 1);
    let restored = &live[&after[0].subscription_id];
    assert_eq!(Some(&restored.endpoint_id), device.endpoint_id.as_ref());
    assert_eq!(restored.topic, "topic/comments");
    assert!(ctx.sink.reports().is_empty());
}

#[tokio::test]
async fn test_rolled_back_sync_leaves_no_orphaned_subscriptions() {
    let ctx = setup().await;
    ctx.upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Ios, "T-o1"))
        .await
        .unwrap();
    ctx.upsert_committed(Some(USER_A), &InstallationParams::new(Platform::Ios, "T-o2"))
        .await
        .unwrap();
    let follows = ctx.create_setting(USER_A, "follows", true).await;

    let mut trx = ctx.service.begin().await.unwrap();
    let subscribed = ctx.service.sync_setting(&follows, &mut trx).await.unwrap();
    assert_eq!(subscribed, 2);
    assert_eq!(trx.pending_compensations().len(), 2);
    trx.rollback().await.unwrap();

    assert!(ctx.provider.subscriptions().is_empty());
}
