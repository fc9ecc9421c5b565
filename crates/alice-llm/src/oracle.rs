use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use alice_core::LLMError;

use crate::prompts::{OracleConfig, OraclePrompt, render_template};
use crate::registry::LLMRegistry;
use crate::util::extract_json;

/// What the oracle got back: a parsed JSON object, or the raw text when the
/// reply did not contain one.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleOutput {
    Json(Value),
    Text(String),
}

impl OracleOutput {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// Black-box LLM judgement used by the consolidation policy and engine.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn invoke(&self, prompt: &OraclePrompt) -> Result<OracleOutput, LLMError>;
}

/// `Oracle` that renders the prompt catalogue and calls a provider from the
/// registry.
pub struct LLMOracle {
    registry: Arc<LLMRegistry>,
    config: OracleConfig,
}

impl LLMOracle {
    pub fn new(registry: Arc<LLMRegistry>) -> Self {
        Self {
            registry,
            config: OracleConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OracleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn parse_reply(content: &str) -> OracleOutput {
        let candidate = extract_json(content);
        match serde_json::from_str::<Value>(candidate) {
            Ok(value @ Value::Object(_)) => OracleOutput::Json(value),
            _ => OracleOutput::Text(content.trim().to_string()),
        }
    }
}

#[async_trait]
impl Oracle for LLMOracle {
    async fn invoke(&self, prompt: &OraclePrompt) -> Result<OracleOutput, LLMError> {
        let kind = prompt.kind();
        let alias = self.config.alias_for(kind);
        let provider = self.registry.resolve(alias)?;
        let options = self.config.options_for(kind);

        let rendered = render_template(kind, self.config.template_for(kind), &prompt.fields())?;
        debug!(
            prompt = %kind,
            alias,
            prompt_len = rendered.len(),
            "Invoking oracle"
        );

        let reply = provider.complete_prompt(&rendered, Some(&options)).await?;

        let output = Self::parse_reply(&reply);
        if let OracleOutput::Text(ref text) = output {
            warn!(
                prompt = %kind,
                reply_len = text.len(),
                "Oracle reply contained no JSON object"
            );
        }
        Ok(output)
    }
}
