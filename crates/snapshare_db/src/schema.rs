//! Schema for the installation tables
//!
//! The statements use SQLite syntax, which is the default backend.

use crate::error::DbError;
use crate::DbClient;
use tracing::{debug, info};

const CREATE_STATEMENTS: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS installations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER,
        platform TEXT NOT NULL,
        device_token TEXT NOT NULL,
        endpoint_id TEXT,
        app_version TEXT,
        timezone TEXT,
        locale TEXT,
        created_at TEXT,
        updated_at TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS installations_device_token_unique
        ON installations (device_token)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_settings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        key TEXT NOT NULL,
        push_enabled INTEGER NOT NULL DEFAULT 1,
        UNIQUE(user_id, key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS installation_subscriptions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        installation_id INTEGER NOT NULL REFERENCES installations(id),
        user_setting_id INTEGER NOT NULL REFERENCES user_settings(id),
        subscription_id TEXT NOT NULL,
        UNIQUE(installation_id, user_setting_id)
    )
    "#,
];

/// Create the installation tables if they don't already exist
pub async fn init_schema(db: &DbClient) -> Result<(), DbError> {
    debug!("Initializing installation schema");

    for statement in CREATE_STATEMENTS {
        db.execute(statement).await?;
    }

    info!("Installation schema initialized successfully");
    Ok(())
}
