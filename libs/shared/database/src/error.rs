use shared_models::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted entry {key}: {source}")]
    Corrupted {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{collection} record {id} not found")]
    NotFound { collection: String, id: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => AppError::NotFound(err.to_string()),
            other => AppError::StorageFailure(other.to_string()),
        }
    }
}

/// Failure talking to the remote clinic API.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Authentication error ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },
}

impl RemoteError {
    pub fn is_unauthorized(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<RemoteError>(), Some(RemoteError::Unauthorized { .. }))
    }

    /// Transport errors and 5xx answers say the backend itself is in
    /// trouble; other failures come from a backend that is up.
    pub fn is_availability_failure(err: &anyhow::Error) -> bool {
        if let Some(transport) = err.downcast_ref::<reqwest::Error>() {
            return !transport.is_decode();
        }
        matches!(err.downcast_ref::<RemoteError>(), Some(RemoteError::Status { status, .. }) if *status >= 500)
    }

    /// Body of a 4xx rejection other than auth/not-found, e.g. a duplicate
    /// registration.
    pub fn client_rejection(err: &anyhow::Error) -> Option<&str> {
        match err.downcast_ref::<RemoteError>() {
            Some(RemoteError::Status { status, body }) if (400..500).contains(status) => Some(body),
            _ => None,
        }
    }
}
