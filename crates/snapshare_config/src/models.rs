// --- File: crates/snapshare_config/src/models.rs ---

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// --- Database Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite://data/snapshare.db?mode=rwc, loaded via SNAPSHARE__DATABASE__URL
}

// --- Push Provider Config ---
// Holds non-secret push gateway config. The api key is normally set to
// "secret_from_env" and read from PUSH_API_KEY.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PushConfig {
    /// Base URL of the push gateway, e.g. https://push.internal/v1
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Platform application the iOS endpoints are created under
    pub ios_application: String,
    /// Platform application the Android endpoints are created under
    pub android_application: String,
    /// Notification category key -> provider topic.
    /// Categories listed here are the global (default) categories.
    #[serde(default)]
    pub topics: HashMap<String, String>,
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub push: Option<PushConfig>,
}
