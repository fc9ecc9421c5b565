//! Agent specification types

mod llm;

pub use llm::{LLMSelector, LLMSpec};

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use alice_core::{AliceError, Result};
use alice_llm::{OracleConfig, PromptKind};
use alice_memory::{ChatStateConfig, ConsolidationConfig};
use alice_storage::StorageConfig;

/// Aliases that resolve against the selector even without an `llms` entry.
const RESERVED_ALIASES: [&str; 2] = ["default", "router"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliceSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub llms: HashMap<String, LLMSpec>,

    #[serde(default)]
    pub llm: LLMSelector,

    #[serde(default)]
    pub memory: ConsolidationConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub chat_state: ChatStateConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Raw messages sent to the chat model each turn.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_system_prompt() -> String {
    "You are Alice, a warm and attentive companion. Keep replies short and natural.".to_string()
}

fn default_history_window() -> usize {
    20
}

impl Default for AliceSpec {
    fn default() -> Self {
        Self {
            name: "Alice".to_string(),
            description: None,
            system_prompt: default_system_prompt(),
            llms: HashMap::new(),
            llm: LLMSelector::default(),
            memory: ConsolidationConfig::default(),
            oracle: OracleConfig::default(),
            chat_state: ChatStateConfig::default(),
            storage: StorageConfig::default(),
            history_window: default_history_window(),
        }
    }
}

impl AliceSpec {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let spec: AliceSpec = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AliceError::InvalidSpec(
                "Agent name cannot be empty".to_string(),
            ));
        }

        if self.history_window == 0 {
            return Err(AliceError::InvalidSpec(
                "history_window must be greater than 0".to_string(),
            ));
        }

        self.memory
            .validate()
            .map_err(|e| AliceError::InvalidSpec(e.to_string()))?;
        self.chat_state
            .validate()
            .map_err(|e| AliceError::InvalidSpec(e.to_string()))?;

        // Aliases are only checked against `llms` when providers come from the
        // spec; programmatic registries are validated at build time.
        if self.llms.is_empty() {
            return Ok(());
        }

        if !self.llms.contains_key(&self.llm.default) {
            return Err(AliceError::InvalidSpec(format!(
                "llm.default refers to unknown llms entry '{}'",
                self.llm.default
            )));
        }

        if let Some(ref router) = self.llm.router {
            if !self.llms.contains_key(router) {
                return Err(AliceError::InvalidSpec(format!(
                    "llm.router refers to unknown llms entry '{}'",
                    router
                )));
            }
        }

        for kind in PromptKind::ALL {
            if let Some(ref alias) = self.oracle.settings(kind).llm {
                if !self.llms.contains_key(alias) && !RESERVED_ALIASES.contains(&alias.as_str()) {
                    return Err(AliceError::InvalidSpec(format!(
                        "oracle.{}.llm refers to unknown llms entry '{}'",
                        kind, alias
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn has_multi_llm(&self) -> bool {
        self.llms.len() > 1
    }

    pub fn has_persistent_storage(&self) -> bool {
        !matches!(self.storage, StorageConfig::Memory)
    }
}
