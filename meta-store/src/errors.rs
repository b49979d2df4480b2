//! Unified error types for the crate.

use thiserror::Error;

use doc_base::PortError;

/// Top-level error for meta-store operations.
#[derive(Debug, Error)]
pub enum MetaStoreError {
    /// Database errors (wrapped).
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// JSON column (de)serialization errors.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A status transition touched no row (wrong prior state or unknown id).
    #[error("no row updated for document {0}")]
    NoRowUpdated(uuid::Uuid),
}

impl From<MetaStoreError> for PortError {
    fn from(err: MetaStoreError) -> Self {
        match &err {
            MetaStoreError::Sqlx(_) => PortError::Transient(err.to_string()),
            MetaStoreError::Json(_) => PortError::Schema(err.to_string()),
            MetaStoreError::NoRowUpdated(_) => PortError::Storage(err.to_string()),
        }
    }
}
