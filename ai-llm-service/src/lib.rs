//! Shared LLM service with three active text profiles (`fast`, `slow`,
//! `embedding`) plus an optional `vision` profile.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (endpoint+model+key+timeout).
//! - Retries transient and rate-limit failures with exponential backoff and
//!   jitter before surfacing an error.
//! - Implements the `doc-base` capability ports via thin profile wrappers.

pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod ports;
pub mod retry;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::AiLlmError;
pub use ports::{ProfileChat, ProfileEmbedder, ProfileVision};
pub use service_profiles::{ChatProfile, LlmServiceProfiles};
