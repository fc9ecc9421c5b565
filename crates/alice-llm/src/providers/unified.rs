use std::str::FromStr;

use alice_core::{
    ChatMessage, FinishReason, LLMConfig, LLMError, LLMProvider, LLMResponse, Role, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Remote or local backend reachable through the `llm` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    Anthropic,
    /// Local models; no API key.
    Ollama,
    DeepSeek,
    Groq,
    Google,
    Mistral,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::DeepSeek => "deepseek",
            Self::Groq => "groq",
            Self::Google => "google",
            Self::Mistral => "mistral",
        }
    }

    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Google => Some("GOOGLE_API_KEY"),
            Self::Mistral => Some("MISTRAL_API_KEY"),
            Self::Ollama => None,
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Ollama => Some("http://localhost:11434"),
            _ => None,
        }
    }

    fn to_llm_backend(self) -> llm::builder::LLMBackend {
        match self {
            Self::OpenAI => llm::builder::LLMBackend::OpenAI,
            Self::Anthropic => llm::builder::LLMBackend::Anthropic,
            Self::Ollama => llm::builder::LLMBackend::Ollama,
            Self::DeepSeek => llm::builder::LLMBackend::DeepSeek,
            Self::Groq => llm::builder::LLMBackend::Groq,
            Self::Google => llm::builder::LLMBackend::Google,
            Self::Mistral => llm::builder::LLMBackend::Mistral,
        }
    }
}

impl FromStr for ProviderType {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "deepseek" => Ok(Self::DeepSeek),
            "groq" => Ok(Self::Groq),
            "google" | "gemini" => Ok(Self::Google),
            "mistral" => Ok(Self::Mistral),
            other => Err(LLMError::Config(format!("unknown provider type: {}", other))),
        }
    }
}

/// `LLMProvider` backed by the `llm` crate.
///
/// A fresh backend client is built per call so per-call sampling options
/// (the oracle's temperature/top_p/max_tokens) take effect. System messages
/// are folded into the backend's system prompt; the rest keep their order.
#[derive(Debug)]
pub struct UnifiedLLMProvider {
    provider_type: ProviderType,
    model: String,
    api_key: Option<String>,
    base_url: Option<String>,
    defaults: LLMConfig,
}

impl UnifiedLLMProvider {
    pub fn new(
        provider_type: ProviderType,
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, LLMError> {
        let api_key = match (api_key, provider_type.api_key_env_var()) {
            (Some(key), _) => Some(key),
            (None, Some(env_var)) => Some(std::env::var(env_var).map_err(|_| {
                LLMError::Config(format!(
                    "API key not found in environment variable {}",
                    env_var
                ))
            })?),
            (None, None) => None,
        };

        let base_url = base_url.or_else(|| provider_type.default_base_url().map(String::from));

        Ok(Self {
            provider_type,
            model,
            api_key,
            base_url,
            defaults: LLMConfig::default(),
        })
    }

    pub fn from_env(
        provider_type: ProviderType,
        model: impl Into<String>,
    ) -> Result<Self, LLMError> {
        Self::new(provider_type, model.into(), None, None)
    }

    /// Sampling options applied when a call passes none of its own.
    pub fn with_defaults(mut self, defaults: LLMConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn split_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<llm::chat::ChatMessage>) {
        let mut system = Vec::new();
        let mut chat = Vec::with_capacity(messages.len());
        for msg in messages {
            match msg.role {
                Role::System => system.push(msg.content.as_str()),
                Role::User => chat.push(llm::chat::ChatMessage::user().content(&msg.content).build()),
                Role::Assistant => chat.push(
                    llm::chat::ChatMessage::assistant()
                        .content(&msg.content)
                        .build(),
                ),
            }
        }
        let system = (!system.is_empty()).then(|| system.join("\n\n"));
        (system, chat)
    }

    fn build_llm(
        &self,
        system: Option<String>,
        config: Option<&LLMConfig>,
    ) -> Result<Box<dyn llm::LLMProvider>, LLMError> {
        let effective = match config {
            Some(cfg) => self.defaults.clone().merge(cfg),
            None => self.defaults.clone(),
        };

        let mut builder = llm::builder::LLMBuilder::new()
            .backend(self.provider_type.to_llm_backend())
            .model(&self.model);

        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.api_key(key);
        }
        if let Some(ref url) = self.base_url {
            builder = builder.base_url(url);
        }
        if let Some(system) = system {
            builder = builder.system(system);
        }
        if let Some(temp) = effective.temperature {
            builder = builder.temperature(temp);
        }
        if let Some(max_tok) = effective.max_tokens {
            builder = builder.max_tokens(max_tok);
        }
        if let Some(top_p) = effective.top_p {
            builder = builder.top_p(top_p);
        }
        if effective.repeat_penalty.is_some() {
            debug!(
                provider = self.provider_type.as_str(),
                "repeat_penalty is not supported by this backend, ignoring"
            );
        }

        builder
            .build()
            .map_err(|e| LLMError::Config(format!("Failed to build LLM: {}", e)))
    }
}

#[async_trait]
impl LLMProvider for UnifiedLLMProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LLMError> {
        let (system, llm_messages) = Self::split_messages(messages);
        let llm = self.build_llm(system, config)?;

        let response = llm.chat(&llm_messages).await.map_err(|e| LLMError::API {
            message: format!("LLM provider error: {}", e),
            status: None,
        })?;

        let content = response.text().unwrap_or_default();
        let usage = response
            .usage()
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

        let mut result = LLMResponse::new(content, FinishReason::Stop).with_model(&self.model);
        if let Some(usage) = usage {
            result = result.with_usage(usage);
        }
        Ok(result)
    }

    fn provider_name(&self) -> &str {
        self.provider_type.as_str()
    }
}

#[derive(Default)]
pub struct ProviderBuilder {
    provider_type: Option<ProviderType>,
    model: Option<String>,
    api_key: Option<String>,
    api_key_env: Option<String>,
    base_url: Option<String>,
    defaults: LLMConfig,
}

impl ProviderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider_type: ProviderType) -> Self {
        self.provider_type = Some(provider_type);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn api_key_env(mut self, env_var: impl Into<String>) -> Self {
        self.api_key_env = Some(env_var.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn defaults(mut self, defaults: LLMConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn build(self) -> Result<UnifiedLLMProvider, LLMError> {
        let provider_type = self
            .provider_type
            .ok_or_else(|| LLMError::Config("Provider type not set".to_string()))?;

        let model = self
            .model
            .ok_or_else(|| LLMError::Config("Model not set".to_string()))?;

        let api_key = match (self.api_key, self.api_key_env) {
            (Some(key), _) => Some(key),
            (None, Some(env_var)) => Some(std::env::var(&env_var).map_err(|_| {
                LLMError::Config(format!("API key environment variable {} not found", env_var))
            })?),
            (None, None) => None,
        };

        Ok(UnifiedLLMProvider::new(provider_type, model, api_key, self.base_url)?
            .with_defaults(self.defaults))
    }
}
