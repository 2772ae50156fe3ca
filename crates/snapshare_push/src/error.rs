//! Provider errors and their classification
//!
//! Providers report failures as a code plus a human readable message. The saga
//! only cares about a handful of cases, and `classify` is the one place that
//! knows how to recognise them.

use thiserror::Error;

/// Error code used for failures that never reached the provider.
pub const TRANSPORT_ERROR_CODE: &str = "Transport";

/// An error reported by (or on the way to) the push provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("push provider error [{}]: {message}", .code.as_deref().unwrap_or("unknown"))]
pub struct ProviderError {
    /// Provider error code, e.g. "InvalidParameter" or "NotFound"
    pub code: Option<String>,

    /// Provider error message
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// An error without a provider code
    pub fn opaque(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_ERROR_CODE, message)
    }

    /// Shorthand for `classify(self)`.
    pub fn classify(&self) -> ProviderFailure {
        classify(self)
    }
}

/// What a provider error means for the saga
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    /// An endpoint already exists for the token; the existing one can be reused
    Conflict { existing_endpoint: String },

    /// The addressed endpoint no longer exists on the provider
    EndpointMissing,

    /// The provider rejected a parameter, typically a stale or disabled endpoint
    InvalidParameter,

    /// Anything else
    Fatal,
}

const ALREADY_EXISTS: &str = " already exists";
const ENDPOINT_PREFIX: &str = "Endpoint ";

/// Classify a provider error.
///
/// The conflict check runs first because providers report it under the
/// invalid-parameter code, with the existing endpoint only named in the message
/// ("... Endpoint <id> already exists with the same Token ...").
pub fn classify(err: &ProviderError) -> ProviderFailure {
    if let Some(existing_endpoint) = extract_existing_endpoint(&err.message) {
        return ProviderFailure::Conflict { existing_endpoint };
    }

    let code = err.code.as_deref().unwrap_or_default();
    if code == "NotFound" || err.message.contains("does not exist") {
        return ProviderFailure::EndpointMissing;
    }

    if code == "InvalidParameter" || err.message.contains("Invalid parameter") {
        return ProviderFailure::InvalidParameter;
    }

    ProviderFailure::Fatal
}

fn extract_existing_endpoint(message: &str) -> Option<String> {
    let end = message.find(ALREADY_EXISTS)?;
    let head = &message[..end];
    let start = head.rfind(ENDPOINT_PREFIX)? + ENDPOINT_PREFIX.len();
    let endpoint = head[start..].trim();

    if endpoint.is_empty() || endpoint.contains(char::is_whitespace) {
        None
    } else {
        Some(endpoint.to_string())
    }
}
