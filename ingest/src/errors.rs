use crate::store::StoreError;
use crate::validate::BatchError;
use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T, E = IngestError> = std::result::Result<T, E>;

/// Request-level failures of the ingest and state endpoints
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid batch: {0}")]
    InvalidBatch(#[from] BatchError),

    #[error("no valid items in batch")]
    NoValidItems,

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Machine readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::InvalidBatch(err) => err.code(),
            IngestError::NoValidItems => "no_valid_items",
            IngestError::RateLimited { .. } => "rate_limited",
            IngestError::Store(_) => "store_unavailable",
            IngestError::Internal(_) => "internal_error",
        }
    }
}

/// Failures while starting the service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] crate::config::ValidationError),

    #[error("could not create store: {0}")]
    Store(#[from] StoreError),

    #[error("could not create classifier: {0}")]
    Classifier(#[from] geocoder::ClassifierError),
}
