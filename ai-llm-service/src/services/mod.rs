pub mod ollama_service;
pub mod open_ai_service;

/// Provider-agnostic chat call parameters resolved by the profile layer.
#[derive(Debug, Clone, Copy)]
pub struct ChatCall<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub json_mode: bool,
}
