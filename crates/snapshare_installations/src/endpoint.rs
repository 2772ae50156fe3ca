//! Endpoint registry
//!
//! Maps a device (platform, token, owning user) to a provider endpoint. The
//! provider is the source of truth for whether an endpoint is alive; the
//! `endpoint_id` stored on an installation is only a cached handle and is
//! healed here whenever the provider reports it gone.

use snapshare_db::repositories::installation;
use snapshare_db::{DbError, Installation, NewInstallation, Platform, UserId};
use snapshare_push::{EndpointAttributes, ProviderFailure};
use tracing::{debug, info, warn};

use crate::compensation::SagaTransaction;
use crate::context::SagaContext;
use crate::error::InstallationError;
use crate::subscription::SubscriptionManager;

/// The tuple an endpoint is registered for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub platform: Platform,
    pub device_token: String,
    pub user_id: Option<UserId>,
}

impl DeviceIdentity {
    /// The owning user as provider custom data.
    fn custom_user_data(&self) -> Option<String> {
        self.user_id.map(|id| id.to_string())
    }
}

impl From<&Installation> for DeviceIdentity {
    fn from(installation: &Installation) -> Self {
        Self {
            platform: installation.platform,
            device_token: installation.device_token.clone(),
            user_id: installation.user_id,
        }
    }
}

impl From<&NewInstallation> for DeviceIdentity {
    fn from(installation: &NewInstallation) -> Self {
        Self {
            platform: installation.platform,
            device_token: installation.device_token.clone(),
            user_id: installation.user_id,
        }
    }
}

/// Where an installation's endpoint stands while it is being refreshed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointState {
    /// No endpoint recorded yet
    Unregistered,
    /// An endpoint is recorded but not yet confirmed by the provider
    Known(String),
    /// The provider no longer knows the recorded endpoint
    Stale(String),
    /// A replacement for a stale endpoint is being created
    Recreating,
    /// The provider confirmed (or just created) the endpoint
    Registered(String),
}

impl EndpointState {
    pub fn from_recorded(endpoint_id: Option<&str>) -> Self {
        match endpoint_id {
            Some(id) => EndpointState::Known(id.to_string()),
            None => EndpointState::Unregistered,
        }
    }
}

/// Creates, refreshes and removes provider endpoints
#[derive(Clone)]
pub struct EndpointRegistry {
    ctx: SagaContext,
}

impl EndpointRegistry {
    pub fn new(ctx: SagaContext) -> Self {
        Self { ctx }
    }

    /// Create an endpoint for `device`.
    ///
    /// An "already exists" conflict reuses the existing endpoint after
    /// re-enabling it with fresh attributes. Either way a compensation that
    /// deletes the endpoint on rollback is registered on `trx`.
    pub async fn create_endpoint(
        &self,
        trx: &mut SagaTransaction,
        device: &DeviceIdentity,
    ) -> Result<String, InstallationError> {
        debug!("Creating {} endpoint", device.platform);
        let custom_user_data = device.custom_user_data();

        let endpoint_id = match self
            .ctx
            .provider
            .create_endpoint(
                device.platform,
                &device.device_token,
                custom_user_data.as_deref(),
            )
            .await
        {
            Ok(endpoint_id) => {
                info!("Created endpoint {}", endpoint_id);
                endpoint_id
            }
            Err(e) => match e.classify() {
                ProviderFailure::Conflict { existing_endpoint } => {
                    info!("Endpoint {} already exists, reusing it", existing_endpoint);
                    let attributes = EndpointAttributes {
                        enabled: true,
                        token: device.device_token.clone(),
                        custom_user_data,
                    };
                    self.ctx
                        .provider
                        .set_endpoint_attributes(&existing_endpoint, &attributes)
                        .await?;
                    existing_endpoint
                }
                _ => return Err(e.into()),
            },
        };

        let ctx = self.ctx.clone();
        let endpoint = endpoint_id.clone();
        let device_token = device.device_token.clone();
        trx.compensate(format!("delete endpoint {}", endpoint_id), move || {
            delete_if_unclaimed(ctx, endpoint, device_token)
        });

        Ok(endpoint_id)
    }

    /// Refresh the endpoint recorded for `device`, healing it if necessary.
    ///
    /// Without a recorded endpoint one is created. A recorded endpoint gets
    /// its attributes refreshed; if the provider no longer knows it, a
    /// replacement is created.
    pub async fn update_endpoint(
        &self,
        trx: &mut SagaTransaction,
        device: &DeviceIdentity,
        recorded: Option<&str>,
    ) -> Result<String, InstallationError> {
        let mut state = EndpointState::from_recorded(recorded);

        loop {
            state = match state {
                EndpointState::Unregistered | EndpointState::Recreating => {
                    EndpointState::Registered(self.create_endpoint(trx, device).await?)
                }
                EndpointState::Known(endpoint_id) => {
                    let attributes = EndpointAttributes {
                        enabled: true,
                        token: device.device_token.clone(),
                        custom_user_data: None,
                    };
                    match self
                        .ctx
                        .provider
                        .set_endpoint_attributes(&endpoint_id, &attributes)
                        .await
                    {
                        Ok(()) => EndpointState::Registered(endpoint_id),
                        Err(e) if e.classify() == ProviderFailure::EndpointMissing => {
                            EndpointState::Stale(endpoint_id)
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                EndpointState::Stale(endpoint_id) => {
                    warn!("Endpoint {} is gone on the provider, recreating", endpoint_id);
                    EndpointState::Recreating
                }
                EndpointState::Registered(endpoint_id) => return Ok(endpoint_id),
            };
        }
    }

    /// Delete an endpoint; an endpoint that is already gone counts as deleted.
    pub async fn delete_endpoint(&self, endpoint_id: &str) -> Result<(), InstallationError> {
        delete_endpoint(&self.ctx, endpoint_id).await
    }

    /// Move a device's endpoint to a new owner.
    ///
    /// The previous endpoint is deleted and a fresh one created for `device`.
    /// Whether or not the creation succeeds, a compensation is queued that
    /// recreates the previous owner's endpoint and subscriptions if `trx`
    /// rolls back.
    pub async fn replace_endpoint(
        &self,
        trx: &mut SagaTransaction,
        device: &DeviceIdentity,
        previous: &DeviceIdentity,
        previous_endpoint: &str,
    ) -> Result<String, InstallationError> {
        info!(
            "Replacing endpoint {} for ownership change {:?} -> {:?}",
            previous_endpoint, previous.user_id, device.user_id
        );
        self.delete_endpoint(previous_endpoint).await?;

        let created = self.create_endpoint(trx, device).await;

        let ctx = self.ctx.clone();
        let previous = previous.clone();
        trx.compensate(
            format!("recreate endpoint for token of user {:?}", previous.user_id),
            move || recreate_endpoint(ctx, previous),
        );

        created
    }
}

async fn delete_endpoint(ctx: &SagaContext, endpoint_id: &str) -> Result<(), InstallationError> {
    match ctx.provider.delete_endpoint(endpoint_id).await {
        Ok(()) => {
            info!("Deleted endpoint {}", endpoint_id);
            Ok(())
        }
        Err(e) if e.classify() == ProviderFailure::EndpointMissing => {
            debug!("Endpoint {} was already gone", endpoint_id);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Create-compensation: delete `endpoint_id` unless a committed installation
/// still holds it for `device_token`.
///
/// Runs after rollback on its own pooled connection, so it only sees rows
/// other transactions committed.
async fn delete_if_unclaimed(
    ctx: SagaContext,
    endpoint_id: String,
    device_token: String,
) -> Result<(), InstallationError> {
    let claimant = {
        let mut conn = ctx
            .db
            .pool()
            .acquire()
            .await
            .map_err(|e| DbError::PoolError(e.to_string()))?;
        installation::find_by_token(&mut conn, &device_token).await?
    };

    if let Some(claimant) = claimant {
        if claimant.endpoint_id.as_deref() == Some(endpoint_id.as_str()) {
            info!(
                "Endpoint {} is claimed by installation {}, keeping it",
                endpoint_id, claimant.id
            );
            return Ok(());
        }
    }

    delete_endpoint(&ctx, &endpoint_id).await
}

/// Delete-then-recreate compensation: restore the previous owner's endpoint
/// and subscriptions in a transaction of its own.
async fn recreate_endpoint(
    ctx: SagaContext,
    previous: DeviceIdentity,
) -> Result<(), InstallationError> {
    info!("Recreating endpoint for user {:?}", previous.user_id);
    let registry = EndpointRegistry::new(ctx.clone());
    let subscriptions = SubscriptionManager::new(ctx.clone());
    let mut trx = ctx.begin().await?;

    let result: Result<(), InstallationError> = async {
        let endpoint_id = registry.create_endpoint(&mut trx, &previous).await?;
        let restored = installation::set_endpoint_for_token(
            trx.conn(),
            &previous.device_token,
            &endpoint_id,
        )
        .await?;

        match (restored, previous.user_id) {
            (Some(restored), Some(user_id)) => {
                subscriptions
                    .subscribe_globals(&mut trx, &restored, user_id)
                    .await?;
            }
            (None, _) => warn!("No installation holds the previous token any more"),
            _ => {}
        }
        Ok(())
    }
    .await;

    trx.finish(result).await
}
