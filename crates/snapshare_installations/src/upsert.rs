//! Installation upsert orchestrator
//!
//! Creates or updates the installation for a device token and keeps its
//! endpoint and global subscriptions in line with the owning user:
//!
//! ```text
//! NotFound -> Creating -> Registered
//! Found    -> Updating -> Registered
//! ```
//!
//! Every row write happens on the caller's transaction; provider side effects
//! register their compensations on it.

use std::fmt;

use serde::{Deserialize, Serialize};
use snapshare_db::repositories::installation;
use snapshare_db::{Installation, NewInstallation, Platform, UserId};
use tracing::{debug, info};

use crate::compensation::SagaTransaction;
use crate::endpoint::{DeviceIdentity, EndpointRegistry};
use crate::error::InstallationError;
use crate::subscription::SubscriptionManager;

/// Device data reported by a client
///
/// Only `device_token` is mandatory. Fields left `None` keep their stored
/// value on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationParams {
    pub device_token: String,

    /// The token the device used before a rotation
    #[serde(default)]
    pub old_device_token: Option<String>,

    /// Required when the device is seen for the first time
    #[serde(default)]
    pub platform: Option<Platform>,

    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl InstallationParams {
    pub fn new(platform: Platform, device_token: impl Into<String>) -> Self {
        Self {
            device_token: device_token.into(),
            platform: Some(platform),
            ..Self::default()
        }
    }

    /// Report a rotation from `old_device_token` to `device_token`.
    pub fn rotated(device_token: impl Into<String>, old_device_token: impl Into<String>) -> Self {
        Self {
            device_token: device_token.into(),
            old_device_token: Some(old_device_token.into()),
            ..Self::default()
        }
    }
}

/// Progress of one upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertState {
    NotFound,
    Creating,
    Found,
    Updating,
    Registered,
}

impl fmt::Display for UpsertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpsertState::NotFound => "not_found",
            UpsertState::Creating => "creating",
            UpsertState::Found => "found",
            UpsertState::Updating => "updating",
            UpsertState::Registered => "registered",
        };
        write!(f, "{}", name)
    }
}

struct Progress {
    state: UpsertState,
    renew_globals: bool,
}

impl Progress {
    fn start(found: bool) -> Self {
        let state = if found {
            UpsertState::Found
        } else {
            UpsertState::NotFound
        };
        debug!("Upsert state: {}", state);
        Self {
            state,
            renew_globals: false,
        }
    }

    fn advance(&mut self, next: UpsertState) {
        debug!("Upsert state: {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Composes the endpoint registry and the subscription manager into upserts
#[derive(Clone)]
pub struct UpsertOrchestrator {
    endpoints: EndpointRegistry,
    subscriptions: SubscriptionManager,
}

impl UpsertOrchestrator {
    pub fn new(endpoints: EndpointRegistry, subscriptions: SubscriptionManager) -> Self {
        Self {
            endpoints,
            subscriptions,
        }
    }

    /// Create or update the installation for `params.device_token` on behalf
    /// of `user` (`None` for an anonymous device).
    pub async fn upsert(
        &self,
        trx: &mut SagaTransaction,
        user: Option<UserId>,
        params: &InstallationParams,
    ) -> Result<Installation, InstallationError> {
        if params.device_token.trim().is_empty() {
            return Err(InstallationError::InvalidRequest(
                "device_token must not be empty".to_string(),
            ));
        }

        let found = installation::find_by_tokens(
            trx.conn(),
            &params.device_token,
            params.old_device_token.as_deref(),
        )
        .await?;

        let mut progress = Progress::start(found.is_some());
        let registered = match found {
            None => self.create(trx, &mut progress, user, params).await?,
            Some(existing) => self.update(trx, &mut progress, existing, user, params).await?,
        };
        progress.advance(UpsertState::Registered);

        Ok(registered)
    }

    async fn create(
        &self,
        trx: &mut SagaTransaction,
        progress: &mut Progress,
        user: Option<UserId>,
        params: &InstallationParams,
    ) -> Result<Installation, InstallationError> {
        let platform = params.platform.ok_or_else(|| {
            InstallationError::InvalidRequest(
                "platform is required to register a new device".to_string(),
            )
        })?;
        progress.advance(UpsertState::Creating);
        progress.renew_globals = user.is_some();

        let mut new = NewInstallation {
            user_id: user,
            platform,
            device_token: params.device_token.clone(),
            endpoint_id: None,
            app_version: params.app_version.clone(),
            timezone: params.timezone.clone(),
            locale: params.locale.clone(),
        };

        let endpoint_id = self
            .endpoints
            .create_endpoint(trx, &DeviceIdentity::from(&new))
            .await?;
        new.endpoint_id = Some(endpoint_id);

        let inserted = installation::insert(trx.conn(), &new).await?;

        if let (true, Some(user_id)) = (progress.renew_globals, user) {
            self.subscriptions
                .subscribe_globals(trx, &inserted, user_id)
                .await?;
        }

        info!("Registered new installation {}", inserted.id);
        Ok(inserted)
    }

    async fn update(
        &self,
        trx: &mut SagaTransaction,
        progress: &mut Progress,
        existing: Installation,
        user: Option<UserId>,
        params: &InstallationParams,
    ) -> Result<Installation, InstallationError> {
        progress.advance(UpsertState::Updating);

        let previous = DeviceIdentity::from(&existing);
        let previous_endpoint = existing.endpoint_id.clone();
        let mut current = existing;

        if current.user_id != user {
            info!(
                "Installation {} changes owner {:?} -> {:?}",
                current.id, current.user_id, user
            );
            current.user_id = user;
            progress.renew_globals = true;
        }

        current.device_token = params.device_token.clone();
        if let Some(platform) = params.platform {
            current.platform = platform;
        }
        if let Some(app_version) = &params.app_version {
            current.app_version = Some(app_version.clone());
        }
        if let Some(timezone) = &params.timezone {
            current.timezone = Some(timezone.clone());
        }
        if let Some(locale) = &params.locale {
            current.locale = Some(locale.clone());
        }

        let device = DeviceIdentity::from(&current);
        let endpoint_id = match previous_endpoint.as_deref() {
            Some(previous_endpoint) if progress.renew_globals => {
                self.endpoints
                    .replace_endpoint(trx, &device, &previous, previous_endpoint)
                    .await?
            }
            recorded => self.endpoints.update_endpoint(trx, &device, recorded).await?,
        };
        current.endpoint_id = Some(endpoint_id);

        if progress.renew_globals {
            self.subscriptions.unsubscribe_all(trx, &current).await?;
            if let Some(user_id) = user {
                self.subscriptions
                    .subscribe_globals(trx, &current, user_id)
                    .await?;
            }
        }

        let updated = installation::update(trx.conn(), &current).await?;
        info!("Updated installation {}", updated.id);
        Ok(updated)
    }
}
