//! In-process push provider
//!
//! Behaves like a real provider closely enough for local development and the
//! saga tests: one endpoint per token, conflict messages naming the existing
//! endpoint, "does not exist" for unknown endpoints. Every call is recorded and
//! the next call of a given kind can be made to fail.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use snapshare_common::{BoxFuture, Platform};
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{EndpointAttributes, PushProvider};

/// Kinds of provider calls, used for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateEndpoint,
    SetEndpointAttributes,
    DeleteEndpoint,
    Subscribe,
    Unsubscribe,
}

/// A recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    CreateEndpoint {
        platform: Platform,
        token: String,
        custom_user_data: Option<String>,
    },
    SetEndpointAttributes {
        endpoint_id: String,
        attributes: EndpointAttributes,
    },
    DeleteEndpoint {
        endpoint_id: String,
    },
    Subscribe {
        topic: String,
        endpoint_id: String,
    },
    Unsubscribe {
        subscription_id: String,
    },
}

impl ProviderCall {
    pub fn operation(&self) -> Operation {
        match self {
            ProviderCall::CreateEndpoint { .. } => Operation::CreateEndpoint,
            ProviderCall::SetEndpointAttributes { .. } => Operation::SetEndpointAttributes,
            ProviderCall::DeleteEndpoint { .. } => Operation::DeleteEndpoint,
            ProviderCall::Subscribe { .. } => Operation::Subscribe,
            ProviderCall::Unsubscribe { .. } => Operation::Unsubscribe,
        }
    }
}

/// An endpoint held by the in-memory provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEndpoint {
    pub platform: Platform,
    pub token: String,
    pub enabled: bool,
    pub custom_user_data: Option<String>,
}

/// A topic subscription held by the in-memory provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSubscription {
    pub topic: String,
    pub endpoint_id: String,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    endpoints: BTreeMap<String, StoredEndpoint>,
    subscriptions: BTreeMap<String, StoredSubscription>,
    calls: Vec<ProviderCall>,
    failures: HashMap<Operation, VecDeque<ProviderError>>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Record the call and pop an injected failure for it, if any.
    fn record(&mut self, call: ProviderCall) -> Result<(), ProviderError> {
        let operation = call.operation();
        self.calls.push(call);
        match self.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn endpoint_for_token(&self, token: &str) -> Option<(&String, &StoredEndpoint)> {
        self.endpoints.iter().find(|(_, e)| e.token == token)
    }

    fn create_endpoint(
        &mut self,
        platform: Platform,
        token: String,
        custom_user_data: Option<String>,
    ) -> Result<String, ProviderError> {
        if let Some((id, existing)) = self.endpoint_for_token(&token) {
            if existing.custom_user_data == custom_user_data && existing.platform == platform {
                return Ok(id.clone());
            }
            return Err(ProviderError::new(
                "InvalidParameter",
                format!(
                    "Invalid parameter: Token Reason: Endpoint {} already exists with the same \
                     Token, but different attributes.",
                    id
                ),
            ));
        }

        let id = format!("endpoint/{}/{}", platform, self.next_id());
        self.endpoints.insert(
            id.clone(),
            StoredEndpoint {
                platform,
                token,
                enabled: true,
                custom_user_data,
            },
        );
        Ok(id)
    }

    fn set_endpoint_attributes(
        &mut self,
        endpoint_id: &str,
        attributes: EndpointAttributes,
    ) -> Result<(), ProviderError> {
        let endpoint = self
            .endpoints
            .get_mut(endpoint_id)
            .ok_or_else(|| ProviderError::new("NotFound", "Endpoint does not exist"))?;
        endpoint.enabled = attributes.enabled;
        endpoint.token = attributes.token;
        if attributes.custom_user_data.is_some() {
            endpoint.custom_user_data = attributes.custom_user_data;
        }
        Ok(())
    }

    fn subscribe(&mut self, topic: String, endpoint_id: String) -> Result<String, ProviderError> {
        if !self.endpoints.contains_key(&endpoint_id) {
            return Err(ProviderError::new(
                "InvalidParameter",
                "Invalid parameter: Endpoint Reason: Endpoint is not registered",
            ));
        }

        let id = format!("subscription/{}", self.next_id());
        self.subscriptions
            .insert(id.clone(), StoredSubscription { topic, endpoint_id });
        Ok(id)
    }

    fn unsubscribe(&mut self, subscription_id: &str) -> Result<(), ProviderError> {
        self.subscriptions
            .remove(subscription_id)
            .map(|_| ())
            .ok_or_else(|| {
                ProviderError::new(
                    "InvalidParameter",
                    "Invalid parameter: SubscriptionId Reason: Subscription is not registered",
                )
            })
    }
}

/// A push provider that keeps everything in memory
#[derive(Debug, Default)]
pub struct InMemoryPushProvider {
    state: Mutex<State>,
}

impl InMemoryPushProvider {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves the maps consistent, so poisoning is ignored
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next call of `operation` fail with `error`.
    ///
    /// Failures queue up: two calls to `fail_next` fail the next two calls.
    pub fn fail_next(&self, operation: Operation, error: ProviderError) {
        self.state()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn endpoint(&self, endpoint_id: &str) -> Option<StoredEndpoint> {
        self.state().endpoints.get(endpoint_id).cloned()
    }

    pub fn endpoints(&self) -> BTreeMap<String, StoredEndpoint> {
        self.state().endpoints.clone()
    }

    pub fn subscriptions(&self) -> BTreeMap<String, StoredSubscription> {
        self.state().subscriptions.clone()
    }

    /// Subscriptions currently held by one endpoint.
    pub fn subscriptions_for(&self, endpoint_id: &str) -> Vec<StoredSubscription> {
        self.state()
            .subscriptions
            .values()
            .filter(|s| s.endpoint_id == endpoint_id)
            .cloned()
            .collect()
    }

    /// Add an endpoint without recording a call.
    pub fn seed_endpoint(
        &self,
        platform: Platform,
        token: &str,
        custom_user_data: Option<&str>,
    ) -> String {
        let mut state = self.state();
        let id = format!("endpoint/{}/{}", platform, state.next_id());
        state.endpoints.insert(
            id.clone(),
            StoredEndpoint {
                platform,
                token: token.to_string(),
                enabled: true,
                custom_user_data: custom_user_data.map(str::to_string),
            },
        );
        id
    }

    /// Drop an endpoint and its subscriptions as if the provider expired it.
    pub fn remove_endpoint_out_of_band(&self, endpoint_id: &str) -> bool {
        let mut state = self.state();
        state.subscriptions.retain(|_, s| s.endpoint_id != endpoint_id);
        state.endpoints.remove(endpoint_id).is_some()
    }
}

impl PushProvider for InMemoryPushProvider {
    fn create_endpoint(
        &self,
        platform: Platform,
        token: &str,
        custom_user_data: Option<&str>,
    ) -> BoxFuture<'_, String, ProviderError> {
        let token = token.to_string();
        let custom_user_data = custom_user_data.map(str::to_string);

        Box::pin(async move {
            let mut state = self.state();
            state.record(ProviderCall::CreateEndpoint {
                platform,
                token: token.clone(),
                custom_user_data: custom_user_data.clone(),
            })?;
            let id = state.create_endpoint(platform, token, custom_user_data)?;
            debug!("In-memory provider created endpoint {}", id);
            Ok(id)
        })
    }

    fn set_endpoint_attributes(
        &self,
        endpoint_id: &str,
        attributes: &EndpointAttributes,
    ) -> BoxFuture<'_, (), ProviderError> {
        let endpoint_id = endpoint_id.to_string();
        let attributes = attributes.clone();

        Box::pin(async move {
            let mut state = self.state();
            state.record(ProviderCall::SetEndpointAttributes {
                endpoint_id: endpoint_id.clone(),
                attributes: attributes.clone(),
            })?;
            state.set_endpoint_attributes(&endpoint_id, attributes)
        })
    }

    fn delete_endpoint(&self, endpoint_id: &str) -> BoxFuture<'_, (), ProviderError> {
        let endpoint_id = endpoint_id.to_string();

        Box::pin(async move {
            let mut state = self.state();
            state.record(ProviderCall::DeleteEndpoint {
                endpoint_id: endpoint_id.clone(),
            })?;
            // Deleting an unknown endpoint succeeds, like the real thing
            state.subscriptions.retain(|_, s| s.endpoint_id != endpoint_id);
            state.endpoints.remove(&endpoint_id);
            Ok(())
        })
    }

    fn subscribe(&self, topic: &str, endpoint_id: &str) -> BoxFuture<'_, String, ProviderError> {
        let topic = topic.to_string();
        let endpoint_id = endpoint_id.to_string();

        Box::pin(async move {
            let mut state = self.state();
            state.record(ProviderCall::Subscribe {
                topic: topic.clone(),
                endpoint_id: endpoint_id.clone(),
            })?;
            state.subscribe(topic, endpoint_id)
        })
    }

    fn unsubscribe(&self, subscription_id: &str) -> BoxFuture<'_, (), ProviderError> {
        let subscription_id = subscription_id.to_string();

        Box::pin(async move {
            let mut state = self.state();
            state.record(ProviderCall::Unsubscribe {
                subscription_id: subscription_id.clone(),
            })?;
            state.unsubscribe(&subscription_id)
        })
    }
}
