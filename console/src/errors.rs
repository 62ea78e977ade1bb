// console/src/errors.rs
use crate::backend::BackendError;
use crate::storage::StorageError;
use crate::validation::FieldErrors;

/// Login failures. The display text is what the operator is shown.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Please correct the highlighted fields: {0}")]
    Validation(FieldErrors),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("The login service is unavailable, try again later")]
    ServiceUnavailable,
    #[error("No response from the server, check your connection")]
    NoResponse,
    #[error("Could not start the session")]
    Failed(String),
}

impl AuthError {
    /// Map a backend failure of the login call to the operator-facing class
    pub fn from_backend(error: &BackendError) -> Self {
        match error {
            BackendError::Status(400 | 401 | 403) => AuthError::InvalidCredentials,
            BackendError::Status(404 | 500) => AuthError::ServiceUnavailable,
            BackendError::NoResponse(_) => AuthError::NoResponse,
            other => AuthError::Failed(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session was already restored")]
    AlreadyRestored,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of gated client operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Your session has expired")]
    SessionExpired,
    #[error("Please correct the highlighted fields: {0}")]
    Validation(FieldErrors),
    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("could not save report: {0}")]
    Io(#[from] std::io::Error),
}
