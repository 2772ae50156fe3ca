//! Subscription manager
//!
//! Keeps provider topic subscriptions and the `installation_subscriptions`
//! join table in step. A join row exists exactly while the provider holds the
//! subscription it names.
//!
//! Rolling back undoes the provider side too: a new subscription is dropped
//! again, and a removed one is taken out anew and written onto the restored
//! join row.

use serde::{Deserialize, Serialize};
use snapshare_db::repositories::{installation, installation_subscription, user_setting};
use snapshare_db::{Installation, InstallationSubscription, UserId, UserSetting};
use snapshare_push::ProviderFailure;
use tracing::{debug, info, warn};

use crate::compensation::SagaTransaction;
use crate::context::SagaContext;
use crate::error::InstallationError;

/// What to subscribe an installation to
///
/// An explicit `topic` wins over the topic mapped from `setting`. With a
/// setting, the join row for (installation, setting) is written on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub setting: Option<UserSetting>,
    pub topic: Option<String>,
}

impl SubscribeRequest {
    pub fn for_setting(setting: UserSetting) -> Self {
        Self {
            setting: Some(setting),
            topic: None,
        }
    }

    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            setting: None,
            topic: Some(topic.into()),
        }
    }
}

/// Why a subscribe request did not reach (or was turned down by) the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The setting has push delivery disabled
    PushDisabled,
    /// The setting's category has no topic
    NoTopic,
    /// The installation has no endpoint yet
    NoEndpoint,
    /// The provider rejected the endpoint as an invalid parameter
    EndpointRejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribeOutcome {
    Subscribed { subscription_id: String },
    Skipped(SkipReason),
}

impl SubscribeOutcome {
    pub fn is_subscribed(&self) -> bool {
        matches!(self, SubscribeOutcome::Subscribed { .. })
    }
}

/// Which join rows to unsubscribe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsubscribeTarget {
    /// A join row the caller already holds
    Subscription(InstallationSubscription),
    /// Resolve the rows of `user_setting_id` on each of `installation_ids`
    Lookup {
        installation_ids: Vec<i64>,
        user_setting_id: i64,
    },
}

/// Subscribes installations to provider topics and tracks the handles
#[derive(Clone)]
pub struct SubscriptionManager {
    ctx: SagaContext,
}

impl SubscriptionManager {
    pub fn new(ctx: SagaContext) -> Self {
        Self { ctx }
    }

    /// Subscribe one installation.
    ///
    /// Resolves without a provider call when the setting has push disabled,
    /// when no topic can be determined or when the installation has no
    /// endpoint. An invalid-parameter answer from the provider is a soft
    /// success and writes no join row.
    pub async fn subscribe(
        &self,
        trx: &mut SagaTransaction,
        installation: &Installation,
        request: &SubscribeRequest,
    ) -> Result<SubscribeOutcome, InstallationError> {
        if let Some(setting) = &request.setting {
            if !setting.push_enabled {
                debug!("Push disabled for setting {}, not subscribing", setting.id);
                return Ok(SubscribeOutcome::Skipped(SkipReason::PushDisabled));
            }
        }

        let topic = if let Some(topic) = &request.topic {
            topic.clone()
        } else if let Some(setting) = &request.setting {
            match self.ctx.topics.topic_for(&setting.key) {
                Some(topic) => topic.to_string(),
                None => {
                    debug!("Category {} has no topic, not subscribing", setting.key);
                    return Ok(SubscribeOutcome::Skipped(SkipReason::NoTopic));
                }
            }
        } else {
            return Err(InstallationError::InvalidRequest(
                "subscribe needs a setting or a topic".to_string(),
            ));
        };

        let Some(endpoint_id) = installation.endpoint_id.as_deref() else {
            warn!(
                "Installation {} has no endpoint, not subscribing to {}",
                installation.id, topic
            );
            return Ok(SubscribeOutcome::Skipped(SkipReason::NoEndpoint));
        };

        let subscription_id = match self.ctx.provider.subscribe(&topic, endpoint_id).await {
            Ok(subscription_id) => subscription_id,
            Err(e) if e.classify() == ProviderFailure::InvalidParameter => {
                warn!(
                    "Provider rejected endpoint {} for topic {}: {}",
                    endpoint_id, topic, e
                );
                return Ok(SubscribeOutcome::Skipped(SkipReason::EndpointRejected));
            }
            Err(e) => return Err(e.into()),
        };

        let ctx = self.ctx.clone();
        let dropped = subscription_id.clone();
        trx.compensate(format!("unsubscribe {}", subscription_id), move || {
            drop_subscription(ctx, dropped)
        });

        if let Some(setting) = &request.setting {
            installation_subscription::upsert(
                trx.conn(),
                installation.id,
                setting.id,
                &subscription_id,
            )
            .await?;
        }

        info!(
            "Installation {} subscribed to {} as {}",
            installation.id, topic, subscription_id
        );
        Ok(SubscribeOutcome::Subscribed { subscription_id })
    }

    /// Subscribe several installations one after another.
    ///
    /// Stops at the first failure; the caller's transaction decides what
    /// happens to the work done so far.
    pub async fn subscribe_many(
        &self,
        trx: &mut SagaTransaction,
        installations: &[Installation],
        request: &SubscribeRequest,
    ) -> Result<Vec<SubscribeOutcome>, InstallationError> {
        let mut outcomes = Vec::with_capacity(installations.len());
        for installation in installations {
            outcomes.push(self.subscribe(trx, installation, request).await?);
        }
        Ok(outcomes)
    }

    /// Unsubscribe the join rows named by `target`.
    ///
    /// An invalid-parameter answer from the provider still deletes the row.
    /// Returns the number of rows removed.
    pub async fn unsubscribe(
        &self,
        trx: &mut SagaTransaction,
        target: UnsubscribeTarget,
    ) -> Result<usize, InstallationError> {
        let rows = match target {
            UnsubscribeTarget::Subscription(row) => vec![row],
            UnsubscribeTarget::Lookup {
                installation_ids,
                user_setting_id,
            } => {
                let mut rows = Vec::new();
                for installation_id in installation_ids {
                    if let Some(row) =
                        installation_subscription::find(trx.conn(), installation_id, user_setting_id)
                            .await?
                    {
                        rows.push(row);
                    }
                }
                rows
            }
        };

        let mut removed = 0;
        for row in rows {
            if self.unsubscribe_row(trx, &row).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Unsubscribe every join row of an installation.
    pub async fn unsubscribe_all(
        &self,
        trx: &mut SagaTransaction,
        installation: &Installation,
    ) -> Result<usize, InstallationError> {
        let rows =
            installation_subscription::find_by_installation(trx.conn(), installation.id).await?;
        debug!(
            "Unsubscribing installation {} from {} topic(s)",
            installation.id,
            rows.len()
        );

        let mut removed = 0;
        for row in rows {
            if self.unsubscribe_row(trx, &row).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Subscribe an installation to each of the user's push-enabled global
    /// categories.
    pub async fn subscribe_globals(
        &self,
        trx: &mut SagaTransaction,
        installation: &Installation,
        user_id: UserId,
    ) -> Result<Vec<SubscribeOutcome>, InstallationError> {
        let settings = user_setting::find_push_enabled_for_user(trx.conn(), user_id).await?;

        let mut outcomes = Vec::new();
        for setting in settings
            .into_iter()
            .filter(|s| self.ctx.topics.is_global(&s.key))
        {
            let request = SubscribeRequest::for_setting(setting);
            outcomes.push(self.subscribe(trx, installation, &request).await?);
        }
        Ok(outcomes)
    }

    async fn unsubscribe_row(
        &self,
        trx: &mut SagaTransaction,
        row: &InstallationSubscription,
    ) -> Result<bool, InstallationError> {
        match self.ctx.provider.unsubscribe(&row.subscription_id).await {
            Ok(()) => {}
            Err(e) if e.classify() == ProviderFailure::InvalidParameter => {
                warn!(
                    "Provider rejected unsubscribe of {}, dropping the row anyway: {}",
                    row.subscription_id, e
                );
            }
            Err(e) => return Err(e.into()),
        }

        let ctx = self.ctx.clone();
        let removed = row.clone();
        trx.compensate(
            format!("restore subscription {}", row.subscription_id),
            move || restore_subscription(ctx, removed),
        );

        Ok(installation_subscription::delete(trx.conn(), row.id).await?)
    }
}

async fn drop_subscription(
    ctx: SagaContext,
    subscription_id: String,
) -> Result<(), InstallationError> {
    match ctx.provider.unsubscribe(&subscription_id).await {
        Ok(()) => {
            info!("Subscription {} dropped", subscription_id);
            Ok(())
        }
        Err(e) if e.classify() == ProviderFailure::InvalidParameter => {
            debug!("Subscription {} already gone: {}", subscription_id, e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Subscribe again for a join row the rollback brought back.
///
/// Runs in a saga transaction of its own. A row whose handle was rewritten in
/// the meantime (an endpoint recreation re-subscribes the previous owner) is
/// left alone; a row that can no longer be subscribed is deleted.
async fn restore_subscription(
    ctx: SagaContext,
    removed: InstallationSubscription,
) -> Result<(), InstallationError> {
    let manager = SubscriptionManager::new(ctx.clone());
    let mut trx = ctx.begin().await?;

    let result: Result<(), InstallationError> = async {
        let current = installation_subscription::find(
            trx.conn(),
            removed.installation_id,
            removed.user_setting_id,
        )
        .await?;
        let Some(current) = current else {
            return Ok(());
        };
        if current.subscription_id != removed.subscription_id {
            debug!(
                "Subscription {} was superseded by {}",
                removed.subscription_id, current.subscription_id
            );
            return Ok(());
        }

        let installation = installation::find_by_id(trx.conn(), current.installation_id).await?;
        let setting = user_setting::find_by_id(trx.conn(), current.user_setting_id).await?;
        let outcome = match (installation, setting) {
            (Some(installation), Some(setting)) => {
                let request = SubscribeRequest::for_setting(setting);
                manager.subscribe(&mut trx, &installation, &request).await?
            }
            _ => SubscribeOutcome::Skipped(SkipReason::NoEndpoint),
        };

        if !outcome.is_subscribed() {
            warn!(
                "Cannot restore subscription {}, dropping its row",
                removed.subscription_id
            );
            installation_subscription::delete(trx.conn(), current.id).await?;
        }
        Ok(())
    }
    .await;

    trx.finish(result).await
}
