use thiserror::Error;

/// Validation errors for canonical primitives.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// When a value does not match the required pattern.
    #[error("{field} ('{value}') is not allowed")]
    PatternMismatch {
        /// Field name that failed validation.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// When a value cannot be decoded into its binary form.
    #[error("{field} could not be decoded: {reason}")]
    Undecodable {
        /// Field name that failed to decode.
        field: &'static str,
        /// Decoder message.
        reason: String,
    },
}
