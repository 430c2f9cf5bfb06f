use thiserror::Error;

/// Application-wide error types for leaseq.
#[derive(Error, Debug)]
pub enum AppError {
    /// The item store could not be reached or failed before any write began.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Request rejected before any store access.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The atomic write of a submit batch could not commit. No row changed.
    #[error("Reconcile failed: {0}")]
    ReconcileFailed(String),

    /// Point lookup of an item that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or malformed configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Queue service answered with an unexpected HTTP status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error talking to the queue service.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

impl AppError {
    /// Returns true if this error is transient and the whole call is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::StorageUnavailable(_)
                | AppError::ReconcileFailed(_)
                | AppError::NetworkError(_)
                | AppError::Timeout(_)
        )
    }

    /// Stable machine-readable kind, shared by the HTTP transport and client.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::ReconcileFailed(_) => "reconcile_failed",
            AppError::NotFound(_) => "not_found",
            AppError::ConfigError(_) => "config_error",
            AppError::SerializationError(_) => "serialization_error",
            AppError::HttpError(_) => "http_error",
            AppError::NetworkError(_) => "network_error",
            AppError::Timeout(_) => "timeout",
        }
    }
}
