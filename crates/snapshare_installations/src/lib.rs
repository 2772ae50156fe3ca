//! Device installation registration for Snapshare
//!
//! This crate keeps a device's `installations` row consistent with its
//! endpoint and topic subscriptions at the push provider. The provider does
//! not take part in database transactions, so every provider side effect
//! registers a compensating action on the [`SagaTransaction`] it ran under;
//! rolling the transaction back runs them.
//!
//! # Example
//!
//! ```rust,no_run
//! use snapshare_installations::{InstallationParams, InstallationService};
//! use snapshare_common::Platform;
//!
//! async fn register(service: &InstallationService) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut trx = service.begin().await?;
//!     let params = InstallationParams::new(Platform::Ios, "device-token");
//!     let result = service.upsert(Some(42), &params, &mut trx).await;
//!     let installation = trx.finish(result).await?;
//!     println!("registered endpoint {:?}", installation.endpoint_id);
//!     Ok(())
//! }
//! ```

pub mod compensation;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod service;
pub mod subscription;
pub mod topics;
pub mod upsert;

#[cfg(test)]
mod compensation_test;

pub use compensation::{
    CompensationAction, CompensationErrorSink, CompensationList, SagaTransaction, TracingErrorSink,
};
pub use context::SagaContext;
pub use endpoint::{DeviceIdentity, EndpointRegistry, EndpointState};
pub use error::InstallationError;
pub use service::InstallationService;
pub use subscription::{
    SkipReason, SubscribeOutcome, SubscribeRequest, SubscriptionManager, UnsubscribeTarget,
};
pub use topics::TopicMap;
pub use upsert::{InstallationParams, UpsertOrchestrator, UpsertState};
