//! Mock provider for local runs and tests.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use crate::models::ChatTurn;
use async_trait::async_trait;

pub const MOCK_MODEL: &str = "mock-text";

/// Answers every turn with a canned, lightly formatted echo.
pub struct MockTextProvider {
    enabled: bool,
}

impl MockTextProvider {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        history: &[ChatTurn],
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ));
        }

        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;

        // The last paragraph of the final turn is the participant's message.
        let message = prompt.rsplit("\n\n").next().unwrap_or(prompt).trim();

        Ok(ProviderResponse {
            text: format!("**Mock** response for: {}", message),
            input_tokens: (prompt.len() / 4 + history.len() * 8) as i32,
            output_tokens: 10,
            finish_reason: FinishReason::Complete,
        })
    }

    fn model(&self) -> &str {
        MOCK_MODEL
    }
}
