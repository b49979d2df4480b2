//! Shared error taxonomy for capability ports.

use thiserror::Error;

/// Failure kinds surfaced by capability adapters.
///
/// The variants mirror the propagation policy: `Transient` and `RateLimited`
/// are retried inside the adapter and only surface once attempts are
/// exhausted; everything else is terminal for the current stage.
#[derive(Debug, Error)]
pub enum PortError {
    /// Network failure, 5xx or timeout from an external service.
    #[error("transient external failure: {0}")]
    Transient(String),

    /// Provider signalled rate limiting and the retry budget is spent.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The input itself is unusable (unsupported MIME, missing blob, oversize).
    #[error("input rejected: {0}")]
    InputRejected(String),

    /// Structured output could not be parsed where a schema is required.
    #[error("schema violation: {0}")]
    Schema(String),

    /// A storage write acknowledged less than expected.
    #[error("storage postcondition failed: {0}")]
    Storage(String),

    /// A required capability or setting is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PortError {
    /// True for kinds the caller may meaningfully retry at a higher level.
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Transient(_) | PortError::RateLimited(_))
    }
}
