use thiserror::Error;

/// Core error types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Event hash computation failed.
    #[error("event hash computation failed: {0}")]
    Hash(#[from] charter_canonical::HashError),
    /// A digest or identifier failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] charter_canonical::ValidationError),
    /// Payload could not be encoded as JSON.
    #[error("payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),
}
