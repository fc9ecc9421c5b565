//! LLM request/response types

use serde::{Deserialize, Serialize};

/// A finished reply from a chat model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: FinishReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl LLMResponse {
    pub fn new(content: impl Into<String>, finish_reason: FinishReason) -> Self {
        Self {
            content: content.into(),
            finish_reason,
            usage: None,
            model: None,
        }
    }

    /// A reply that ended normally.
    pub fn stop(content: impl Into<String>) -> Self {
        Self::new(content, FinishReason::Stop)
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Why the model stopped producing tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
    Other,
}

impl FinishReason {
    /// Anything but a clean stop means the text may be cut short.
    pub fn is_truncated(&self) -> bool {
        !matches!(self, FinishReason::Stop)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Sampling options for one LLM call. Unset fields leave the provider default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,
}

impl LLMConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_repeat_penalty(mut self, penalty: f32) -> Self {
        self.repeat_penalty = Some(penalty);
        self
    }

    pub fn merge(mut self, other: &LLMConfig) -> Self {
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.max_tokens.is_some() {
            self.max_tokens = other.max_tokens;
        }
        if other.top_p.is_some() {
            self.top_p = other.top_p;
        }
        if other.repeat_penalty.is_some() {
            self.repeat_penalty = other.repeat_penalty;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
        assert_eq!(TokenUsage::new(u32::MAX, 1).total_tokens, u32::MAX);
    }

    #[test]
    fn test_finish_reason_truncation() {
        assert!(!LLMResponse::stop("done").finish_reason.is_truncated());
        assert!(FinishReason::Length.is_truncated());
        assert!(FinishReason::ContentFilter.is_truncated());
    }

    #[test]
    fn test_llm_config_merge() {
        let base = LLMConfig::new().with_temperature(0.5).with_top_p(0.9);
        let overlay = LLMConfig::new().with_max_tokens(256).with_top_p(1.0);
        let merged = base.merge(&overlay);
        assert_eq!(merged.temperature, Some(0.5));
        assert_eq!(merged.max_tokens, Some(256));
        assert_eq!(merged.top_p, Some(1.0));
        assert_eq!(merged.repeat_penalty, None);
    }

    #[test]
    fn test_llm_config_default_is_empty() {
        let yaml = serde_json::to_string(&LLMConfig::default()).unwrap();
        assert_eq!(yaml, "{}");
    }
}
