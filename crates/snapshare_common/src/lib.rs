// --- File: crates/snapshare_common/src/lib.rs ---

// Declare modules within this crate
pub mod error; // Error handling
pub mod logging; // Logging utilities
pub mod models; // Shared data structures
pub mod services; // Async service abstractions


// Re-export error types and utilities for easier access
pub use error::{
    conflict, external_service_error, not_found, validation_error, HttpStatusCode,
    SnapshareError,
};

// Re-export logging utilities for easier access
pub use logging::{init, init_with_level, log_error, log_result};

pub use models::Platform;
pub use services::BoxFuture;

// This crate provides common functionality that can be used across the Snapshare crates.
// It includes the application-level error type, logging setup and async helpers.
