//! Push notification provider integration for Snapshare
//!
//! The saga talks to the provider only through the [`PushProvider`] trait.
//! Two implementations ship with the crate: [`HttpPushProvider`] for a JSON push
//! gateway and [`InMemoryPushProvider`] for local development and tests.
//!
//! Provider failures arrive as [`ProviderError`] and are turned into a
//! [`ProviderFailure`] by [`classify`], the only place that knows how providers
//! phrase conflicts and missing endpoints.

pub mod error;
pub mod http;
pub mod memory;
pub mod provider;

pub use error::{classify, ProviderError, ProviderFailure, TRANSPORT_ERROR_CODE};
pub use http::HttpPushProvider;
pub use memory::{InMemoryPushProvider, Operation, ProviderCall, StoredEndpoint, StoredSubscription};
pub use provider::{EndpointAttributes, PushProvider};
