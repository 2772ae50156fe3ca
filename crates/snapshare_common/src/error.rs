use std::fmt;
use thiserror::Error;

/// The base error type for all Snapshare errors.
///
/// This enum is what request handlers report. Each crate keeps its own
/// error type and converts into this one at the boundary by implementing
/// `From<CrateError> for SnapshareError`.
#[derive(Error, Debug)]
pub enum SnapshareError {
    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during validation of a request
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Error occurred during an external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a conflict (e.g., a uniqueness constraint)
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),
}

/// A trait for converting errors to HTTP status codes.
///
/// The HTTP layer lives outside this workspace; it only needs the status code
/// and the display text of the error.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for SnapshareError {
    fn status_code(&self) -> u16 {
        match self {
            SnapshareError::ParseError(_) => 400,
            SnapshareError::ConfigError(_) => 500,
            SnapshareError::ValidationError(_) => 400,
            SnapshareError::DatabaseError(_) => 500,
            SnapshareError::ExternalServiceError { .. } => 502,
            SnapshareError::ConflictError(_) => 409,
            SnapshareError::NotFoundError(_) => 404,
        }
    }
}

impl From<serde_json::Error> for SnapshareError {
    fn from(err: serde_json::Error) -> Self {
        SnapshareError::ParseError(err.to_string())
    }
}

// Utility functions for error handling
pub fn validation_error<T: fmt::Display>(message: T) -> SnapshareError {
    SnapshareError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> SnapshareError {
    SnapshareError::NotFoundError(message.to_string())
}

pub fn conflict<T: fmt::Display>(message: T) -> SnapshareError {
    SnapshareError::ConflictError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> SnapshareError {
    SnapshareError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}
