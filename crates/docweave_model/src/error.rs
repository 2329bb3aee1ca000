//! Error types for the block model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while decoding or encoding blocks.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A typed payload could not be decoded.
    #[error("invalid payload under '{key}' for block type {block_type}: {source}")]
    Payload {
        /// Wire key holding the payload.
        key: String,
        /// Numeric block type.
        block_type: u32,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_error_display() {
        let source = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let err = ModelError::Payload {
            key: "table".into(),
            block_type: 31,
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("table"));
        assert!(msg.contains("31"));
    }
}
