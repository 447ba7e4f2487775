use super::CompletionService;
use crate::error::{AppResult, Error};
use async_trait::async_trait;
use rig::completion::{Chat, Message};
use rig::providers::gemini::Client as GeminiClient;
use std::time::Duration;
use tracing::info;

/// Completion client driving a Gemini chat agent through Rig
pub struct GeminiCompletionClient {
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiCompletionClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            api_key,
            model,
            timeout,
        }
    }
}

#[async_trait]
impl CompletionService for GeminiCompletionClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> AppResult<String> {
        info!("Requesting completion from Gemini model {}", self.model);

        let gemini_client = GeminiClient::new(&self.api_key);

        let agent = gemini_client
            .agent(&self.model)
            .preamble(system_prompt)
            .temperature(0.2)
            .build();

        let request = agent.chat(user_prompt.to_string(), Vec::<Message>::new());

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => {
                info!("Received completion response ({} bytes)", response.len());
                Ok(response)
            }
            Ok(Err(e)) => Err(Error::CompletionUnavailable(format!(
                "Completion request failed: {}",
                e
            ))),
            Err(_) => Err(Error::CompletionUnavailable(format!(
                "Completion request timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}
