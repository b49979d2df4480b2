use crate::config::llm_provider::LlmProvider;

/// Configuration for one LLM profile (model + endpoint + knobs).
///
/// The same struct covers chat, embedding and vision profiles; which fields
/// matter depends on the call site (`max_tokens`/`temperature` for chat,
/// none of them for embeddings).
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    /// The LLM provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string (e.g., `"gpt-4o"`, `"llama3"`).
    pub model: String,

    /// Inference endpoint (local socket/URL or remote API URL).
    pub endpoint: String,

    /// Optional API key for authentication.
    pub api_key: Option<String>,

    /// Default maximum number of tokens to generate; per-call values win.
    pub max_tokens: Option<u32>,

    /// Default sampling temperature; per-call values win.
    pub temperature: Option<f32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}
