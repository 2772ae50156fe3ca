//! Database integration for Snapshare
//!
//! This crate provides a database client that is designed to be database agnostic,
//! using SQLx's `Any` driver, together with the schema and repositories for
//! device installations, their topic subscriptions and user notification settings.
//!
//! # Example
//!
//! ```rust,no_run
//! use snapshare_db::{repositories::installation, schema, DbClient};
//!
//! async fn setup_db() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = DbClient::from_url("sqlite://data/snapshare.db?mode=rwc").await?;
//!     schema::init_schema(&db).await?;
//!
//!     let mut conn = db.pool().acquire().await?;
//!     let found = installation::find_by_token(&mut conn, "device-token").await?;
//!     println!("{:?}", found);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod repositories;
pub mod schema;


// Re-export the client and models for ease of use
pub use client::{DbClient, DbTransaction};
pub use error::DbError;
pub use models::{
    Installation, InstallationSubscription, NewInstallation, Platform, UserId, UserSetting,
};

// Connection type every repository function runs on
pub use sqlx::AnyConnection;
