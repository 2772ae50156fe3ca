// --- File: crates/snapshare_installations/src/error.rs ---

use snapshare_common::{
    conflict, external_service_error, not_found, validation_error, HttpStatusCode, SnapshareError,
};
use snapshare_db::DbError;
use snapshare_push::ProviderError;
use thiserror::Error;

/// Errors raised by the installation saga
///
/// Provider conflicts and invalid-parameter answers are handled inside the
/// saga and never show up here; `Provider` only carries fatal failures.
#[derive(Error, Debug)]
pub enum InstallationError {
    /// The caller supplied an incomplete or contradictory request
    #[error("Invalid installation request: {0}")]
    InvalidRequest(String),

    /// A referenced row does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The push provider failed in a way the saga cannot absorb
    #[error("Push provider failure: {0}")]
    Provider(#[from] ProviderError),

    /// A uniqueness or foreign key constraint rejected a write
    #[error("Installation constraint violation: {0}")]
    Constraint(String),

    /// Any other database failure
    #[error("Installation database error: {0}")]
    Database(DbError),

    /// The service could not be built from the application configuration
    #[error("Installation configuration error: {0}")]
    Config(String),
}

impl InstallationError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        InstallationError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<DbError> for InstallationError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConstraintViolation(msg) => InstallationError::Constraint(msg),
            other => InstallationError::Database(other),
        }
    }
}

/// Convert InstallationError to SnapshareError
impl From<InstallationError> for SnapshareError {
    fn from(err: InstallationError) -> Self {
        match err {
            InstallationError::InvalidRequest(msg) => validation_error(msg),
            InstallationError::NotFound { entity, id } => not_found(format!("{} {}", entity, id)),
            InstallationError::Provider(e) => external_service_error("Push provider", e.to_string()),
            InstallationError::Constraint(msg) => conflict(msg),
            InstallationError::Database(e) => SnapshareError::DatabaseError(e.to_string()),
            InstallationError::Config(msg) => SnapshareError::ConfigError(msg),
        }
    }
}

impl HttpStatusCode for InstallationError {
    fn status_code(&self) -> u16 {
        match self {
            InstallationError::InvalidRequest(_) => 400,
            InstallationError::NotFound { .. } => 404,
            InstallationError::Provider(_) => 502,
            InstallationError::Constraint(_) => 409,
            InstallationError::Database(_) => 500,
            InstallationError::Config(_) => 500,
        }
    }
}
