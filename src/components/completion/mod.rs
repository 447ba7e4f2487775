mod client;

pub use client::GeminiCompletionClient;

use crate::error::AppResult;
use async_trait::async_trait;

/// Opaque text-completion service: one system prompt, one user prompt, one
/// free-form text response. No streaming, no function calling.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> AppResult<String>;
}
