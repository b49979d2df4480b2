//! Unified error types for the crate.

use thiserror::Error;

use doc_base::PortError;

/// Top-level error for vector-store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Mismatch in vector dimensionality across records.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Payload serialization failures.
    #[error("payload error: {0}")]
    Payload(String),

    /// Qdrant client errors (wrapped).
    #[error("qdrant error: {0}")]
    Qdrant(String),
}

impl From<VectorStoreError> for PortError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::Config(_) => PortError::Config(err.to_string()),
            VectorStoreError::VectorSizeMismatch { .. } | VectorStoreError::Payload(_) => {
                PortError::Storage(err.to_string())
            }
            VectorStoreError::Qdrant(_) => PortError::Transient(err.to_string()),
        }
    }
}
