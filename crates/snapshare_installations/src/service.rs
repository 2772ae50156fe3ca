// --- File: crates/snapshare_installations/src/service.rs ---

use std::sync::Arc;

use snapshare_common::log_result;
use snapshare_config::AppConfig;
use snapshare_db::repositories::installation;
use snapshare_db::{DbClient, Installation, UserId, UserSetting};
use snapshare_push::{HttpPushProvider, PushProvider};
use tracing::{debug, info};

use crate::compensation::{CompensationErrorSink, SagaTransaction, TracingErrorSink};
use crate::context::SagaContext;
use crate::endpoint::EndpointRegistry;
use crate::error::InstallationError;
use crate::subscription::{
    SubscribeOutcome, SubscribeRequest, SubscriptionManager, UnsubscribeTarget,
};
use crate::topics::TopicMap;
use crate::upsert::{InstallationParams, UpsertOrchestrator};

/// Entry point for everything that touches device installations
///
/// Every operation runs on a [`SagaTransaction`] the caller opened with
/// [`begin`](Self::begin) and ends with `finish`, `commit` or `rollback`.
/// Cloning is cheap.
#[derive(Clone)]
pub struct InstallationService {
    ctx: SagaContext,
    endpoints: EndpointRegistry,
    subscriptions: SubscriptionManager,
    orchestrator: UpsertOrchestrator,
}

impl InstallationService {
    /// Creates a service reporting compensation failures through `tracing`
    pub fn new(db: DbClient, provider: Arc<dyn PushProvider>, topics: TopicMap) -> Self {
        Self::with_error_sink(db, provider, topics, Arc::new(TracingErrorSink))
    }

    pub fn with_error_sink(
        db: DbClient,
        provider: Arc<dyn PushProvider>,
        topics: TopicMap,
        sink: Arc<dyn CompensationErrorSink>,
    ) -> Self {
        let ctx = SagaContext::new(db, provider, topics, sink);
        let endpoints = EndpointRegistry::new(ctx.clone());
        let subscriptions = SubscriptionManager::new(ctx.clone());
        let orchestrator = UpsertOrchestrator::new(endpoints.clone(), subscriptions.clone());

        Self {
            ctx,
            endpoints,
            subscriptions,
            orchestrator,
        }
    }

    /// Build the service from the application configuration, talking to the
    /// configured push gateway.
    pub async fn from_config(config: &AppConfig) -> Result<Self, InstallationError> {
        let push_config = config.push.clone().ok_or_else(|| {
            InstallationError::Config("Push configuration is missing".to_string())
        })?;
        let db = log_result(
            DbClient::new(config).await,
            "Installation database connected",
            "Failed to connect installation database",
        )?;
        let topics = TopicMap::from_config(&push_config);
        info!("Installation service configured with {} global topic(s)", topics.len());

        Ok(Self::new(
            db,
            Arc::new(HttpPushProvider::new(push_config)),
            topics,
        ))
    }

    /// Open a saga transaction.
    pub async fn begin(&self) -> Result<SagaTransaction, InstallationError> {
        self.ctx.begin().await
    }

    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn topics(&self) -> &TopicMap {
        self.ctx.topics()
    }

    /// Create or update the installation described by `params`.
    pub async fn upsert(
        &self,
        user: Option<UserId>,
        params: &InstallationParams,
        trx: &mut SagaTransaction,
    ) -> Result<Installation, InstallationError> {
        self.orchestrator.upsert(trx, user, params).await
    }

    pub async fn subscribe(
        &self,
        installation: &Installation,
        request: &SubscribeRequest,
        trx: &mut SagaTransaction,
    ) -> Result<SubscribeOutcome, InstallationError> {
        self.subscriptions.subscribe(trx, installation, request).await
    }

    pub async fn subscribe_many(
        &self,
        installations: &[Installation],
        request: &SubscribeRequest,
        trx: &mut SagaTransaction,
    ) -> Result<Vec<SubscribeOutcome>, InstallationError> {
        self.subscriptions
            .subscribe_many(trx, installations, request)
            .await
    }

    /// Returns the number of join rows removed.
    pub async fn unsubscribe(
        &self,
        target: UnsubscribeTarget,
        trx: &mut SagaTransaction,
    ) -> Result<usize, InstallationError> {
        self.subscriptions.unsubscribe(trx, target).await
    }

    /// Endpoint ids of every registered installation of a user.
    pub async fn get_endpoints_for_user(
        &self,
        user: UserId,
        trx: &mut SagaTransaction,
    ) -> Result<Vec<String>, InstallationError> {
        debug!("Getting endpoints for user: {}", user);
        let installations = installation::find_by_user(trx.conn(), user).await?;
        Ok(installations
            .into_iter()
            .filter_map(|i| i.endpoint_id)
            .collect())
    }

    /// Detach an installation from its user. Nothing else changes.
    pub async fn disassociate(
        &self,
        installation_id: i64,
        trx: &mut SagaTransaction,
    ) -> Result<Installation, InstallationError> {
        let detached = installation::set_user(trx.conn(), installation_id, None)
            .await?
            .ok_or_else(|| InstallationError::not_found("Installation", installation_id))?;

        info!("Installation {} disassociated", installation_id);
        Ok(detached)
    }

    /// Bring every installation of the setting's user in line with its push
    /// flag: subscribe them all when enabled, unsubscribe them all otherwise.
    ///
    /// Returns how many installations were subscribed or unsubscribed.
    pub async fn sync_setting(
        &self,
        setting: &UserSetting,
        trx: &mut SagaTransaction,
    ) -> Result<usize, InstallationError> {
        let installations = installation::find_by_user(trx.conn(), setting.user_id).await?;
        debug!(
            "Syncing setting {} across {} installation(s)",
            setting.id,
            installations.len()
        );

        if setting.push_enabled {
            let request = SubscribeRequest::for_setting(setting.clone());
            let outcomes = self
                .subscriptions
                .subscribe_many(trx, &installations, &request)
                .await?;
            Ok(outcomes.iter().filter(|o| o.is_subscribed()).count())
        } else {
            let target = UnsubscribeTarget::Lookup {
                installation_ids: installations.iter().map(|i| i.id).collect(),
                user_setting_id: setting.id,
            };
            self.subscriptions.unsubscribe(trx, target).await
        }
    }
}
