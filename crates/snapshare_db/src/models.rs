// --- File: crates/snapshare_db/src/models.rs ---

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Re-export Platform from snapshare_common for convenience
pub use snapshare_common::models::Platform;

/// Identifier of a user row owned by the wider platform.
pub type UserId = i64;

/// One physical device registered for push notifications
///
/// `device_token` is the natural key. `endpoint_id` is the provider-side
/// handle bound to that token, `None` until the device is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    /// The unique identifier for this installation
    pub id: i64,

    /// The owning user, if the device is associated with one
    pub user_id: Option<UserId>,

    pub platform: Platform,

    /// The current push token of the device
    pub device_token: String,

    /// The provider endpoint handle
    pub endpoint_id: Option<String>,

    pub app_version: Option<String>,
    pub timezone: Option<String>,
    pub locale: Option<String>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Values for a row that has not been inserted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstallation {
    pub user_id: Option<UserId>,
    pub platform: Platform,
    pub device_token: String,
    pub endpoint_id: Option<String>,
    pub app_version: Option<String>,
    pub timezone: Option<String>,
    pub locale: Option<String>,
}

/// Join row linking an installation to a user setting it is subscribed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationSubscription {
    pub id: i64,
    pub installation_id: i64,
    pub user_setting_id: i64,

    /// The provider subscription handle
    pub subscription_id: String,
}

/// A user's preference for one notification category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSetting {
    pub id: i64,
    pub user_id: UserId,

    /// Notification category key, e.g. "comments"
    pub key: String,

    /// Whether push delivery is enabled for the category
    pub push_enabled: bool,
}

pub(crate) fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

// DateTime<Utc> doesn't implement Decode for sqlx::Any, so timestamps are stored as RFC 3339 text
pub(crate) fn decode_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|ts| ts.with_timezone(&Utc))
}
