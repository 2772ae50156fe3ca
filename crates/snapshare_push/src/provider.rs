//! The push provider capability
//!
//! A provider keeps one endpoint per device token and lets endpoints subscribe
//! to topics. Everything above this trait treats the provider as opaque.

use serde::{Deserialize, Serialize};
use snapshare_common::{BoxFuture, Platform};

use crate::error::ProviderError;

/// Attributes pushed to an existing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAttributes {
    /// Whether the provider should deliver to the endpoint
    pub enabled: bool,

    /// The device token the endpoint is bound to
    pub token: String,

    /// Opaque data stored with the endpoint (the owning user id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_user_data: Option<String>,
}

/// A push notification provider
///
/// Implementations must be cheap to share (`Arc<dyn PushProvider>`); every
/// method is a single remote call with no retries.
pub trait PushProvider: Send + Sync {
    /// Create an endpoint for `token` under the platform's application.
    ///
    /// Returns the endpoint id.
    fn create_endpoint(
        &self,
        platform: Platform,
        token: &str,
        custom_user_data: Option<&str>,
    ) -> BoxFuture<'_, String, ProviderError>;

    /// Overwrite the attributes of an existing endpoint.
    fn set_endpoint_attributes(
        &self,
        endpoint_id: &str,
        attributes: &EndpointAttributes,
    ) -> BoxFuture<'_, (), ProviderError>;

    /// Delete an endpoint.
    fn delete_endpoint(&self, endpoint_id: &str) -> BoxFuture<'_, (), ProviderError>;

    /// Subscribe an endpoint to a topic, returning the subscription id.
    fn subscribe(&self, topic: &str, endpoint_id: &str) -> BoxFuture<'_, String, ProviderError>;

    /// Remove a subscription.
    fn unsubscribe(&self, subscription_id: &str) -> BoxFuture<'_, (), ProviderError>;
}
