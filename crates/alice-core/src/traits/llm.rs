//! Chat model backends

use async_trait::async_trait;
use thiserror::Error;

use crate::message::ChatMessage;
use crate::types::{FinishReason, LLMConfig, LLMResponse};

/// A chat model. The conversation path calls [`complete`](Self::complete)
/// with the assembled context; the memory prompts go through
/// [`complete_prompt`](Self::complete_prompt).
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LLMError>;

    fn provider_name(&self) -> &str;

    /// Single-turn completion of an already rendered prompt.
    async fn complete_prompt(
        &self,
        prompt: &str,
        config: Option<&LLMConfig>,
    ) -> Result<String, LLMError> {
        let messages = [ChatMessage::user(prompt)];
        let response = self.complete(&messages, config).await?;
        if response.finish_reason == FinishReason::ContentFilter {
            return Err(LLMError::Filtered(self.provider_name().to_string()));
        }
        Ok(response.content)
    }
}

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API error: {message}")]
    API {
        message: String,
        status: Option<u16>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Reply withheld by the content filter of {0}")]
    Filtered(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::Serialization(err.to_string())
    }
}
