use std::fmt;

/// Represents the provider (backend) used for LLM inference and embeddings.
///
/// Adding more providers (e.g., Anthropic, Mistral API) is done by extending
/// this enum and the matching service module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    /// Local or remote Ollama runtime.
    Ollama,
    /// OpenAI-compatible chat/embeddings API.
    OpenAi,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::OpenAi => write!(f, "openai"),
        }
    }
}
