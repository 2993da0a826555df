use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use symbiosis_core::{ChatMessage, Result};

/// A request to a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier, e.g. "x-ai/grok-4.1-fast".
    pub model: String,
    /// Ordered prompt messages.
    pub messages: Vec<ChatMessage>,
    /// Ask the provider for a structured (JSON object) reply.
    pub json_mode: bool,
}

impl CompletionRequest {
    /// All message contents joined, for logging and test assertions.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A complete (non-streaming) reply from a provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Raw content of the first candidate message.
    pub content: String,
    pub usage: Usage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait implemented by each completion backend.
///
/// Implementations report HTTP 401/403 as `SymbiosisError::Credentials`, other
/// non-2xx statuses as `SymbiosisError::Http`, and transport failures as
/// `SymbiosisError::Completion`. Retry and timeout are the caller's concern.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Human-readable name, e.g. "openrouter".
    fn name(&self) -> &str;

    /// Send one request and return the raw candidate content.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}
