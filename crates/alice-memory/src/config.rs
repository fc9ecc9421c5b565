use serde::{Deserialize, Serialize};

use alice_core::{AliceError, Result};

/// Window sizes and thresholds for dialogue consolidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Raw messages read per consolidation pass.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Recent summaries read per pass and shown to the oracle.
    #[serde(default = "default_summary_window")]
    pub summary_window: usize,

    /// Below this many unsummarised messages the pass waits without asking
    /// the oracle. Also the smallest batch a summary may cover.
    #[serde(default = "default_min_raw_for_summary")]
    pub min_raw_for_summary: usize,

    /// Cap on the unsummarised working set; older overflow is dropped.
    /// Defaults to `history_window`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_raw_buffer: Option<usize>,
}

fn default_history_window() -> usize {
    20
}

fn default_summary_window() -> usize {
    4
}

fn default_min_raw_for_summary() -> usize {
    4
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            summary_window: default_summary_window(),
            min_raw_for_summary: default_min_raw_for_summary(),
            max_raw_buffer: None,
        }
    }
}

impl ConsolidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_window(mut self, n: usize) -> Self {
        self.history_window = n;
        self
    }

    pub fn with_summary_window(mut self, n: usize) -> Self {
        self.summary_window = n;
        self
    }

    pub fn with_min_raw_for_summary(mut self, n: usize) -> Self {
        self.min_raw_for_summary = n;
        self
    }

    pub fn with_max_raw_buffer(mut self, n: usize) -> Self {
        self.max_raw_buffer = Some(n);
        self
    }

    pub fn raw_buffer_cap(&self) -> usize {
        self.max_raw_buffer.unwrap_or(self.history_window)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_window == 0 {
            return Err(AliceError::Config(
                "memory.history_window must be at least 1".into(),
            ));
        }
        if self.summary_window == 0 {
            return Err(AliceError::Config(
                "memory.summary_window must be at least 1".into(),
            ));
        }
        if self.min_raw_for_summary == 0 {
            return Err(AliceError::Config(
                "memory.min_raw_for_summary must be at least 1".into(),
            ));
        }
        if self.max_raw_buffer == Some(0) {
            return Err(AliceError::Config(
                "memory.max_raw_buffer must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// When and over how many messages the chat state is re-judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStateConfig {
    #[serde(default = "default_chat_state_enabled")]
    pub enabled: bool,

    /// Messages read per judgement, and the number of turns that must pass
    /// before the next one. Falls back to the chat history window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
}

fn default_chat_state_enabled() -> bool {
    true
}

impl Default for ChatStateConfig {
    fn default() -> Self {
        Self {
            enabled: default_chat_state_enabled(),
            window: None,
        }
    }
}

impl ChatStateConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            window: None,
        }
    }

    pub fn with_window(mut self, n: usize) -> Self {
        self.window = Some(n);
        self
    }

    pub fn window_or(&self, fallback: usize) -> usize {
        self.window.unwrap_or(fallback)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window == Some(0) {
            return Err(AliceError::Config(
                "chat_state.window must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsolidationConfig::default();
        assert_eq!(config.history_window, 20);
        assert_eq!(config.summary_window, 4);
        assert_eq!(config.min_raw_for_summary, 4);
        assert_eq!(config.raw_buffer_cap(), 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let config: ConsolidationConfig =
            serde_yaml::from_str("history_window: 40\nmax_raw_buffer: 12").unwrap();
        assert_eq!(config.history_window, 40);
        assert_eq!(config.summary_window, 4);
        assert_eq!(config.raw_buffer_cap(), 12);
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        assert!(ConsolidationConfig::new().with_history_window(0).validate().is_err());
        assert!(ConsolidationConfig::new().with_min_raw_for_summary(0).validate().is_err());
        assert!(ConsolidationConfig::new().with_max_raw_buffer(0).validate().is_err());
        assert!(ChatStateConfig::default().with_window(0).validate().is_err());
    }

    #[test]
    fn test_chat_state_config_yaml() {
        let config: ChatStateConfig = serde_yaml::from_str("window: 8").unwrap();
        assert!(config.enabled);
        assert_eq!(config.window_or(20), 8);

        let config: ChatStateConfig = serde_yaml::from_str("enabled: false").unwrap();
        assert_eq!(config, ChatStateConfig::disabled());
        assert_eq!(config.window_or(20), 20);
    }
}
