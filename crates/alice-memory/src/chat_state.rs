//! Running judgement of how the conversation is going.
//!
//! Every `window` turns the oracle reads the latest messages and labels the
//! interaction type, the user's attitude and mood, and who is steering. The
//! chat model sees the last label as part of its context.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use alice_core::{MessageStore, Result, TurnId};
use alice_llm::{Oracle, OraclePrompt};

use crate::render::render_turns;

const CHAT_STATE_HEADER: &str = "[Chat state]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatState {
    pub interaction: String,
    pub user_attitude: String,
    pub emotional_state: String,
    pub leading_approach: String,
    /// Newest turn the judgement was based on; `None` before the first one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<TurnId>,
}

impl Default for ChatState {
    /// Opening assumption for a fresh conversation.
    fn default() -> Self {
        Self {
            interaction: "small talk".into(),
            user_attitude: "positive".into(),
            emotional_state: "calm".into(),
            leading_approach: "user-led".into(),
            updated_at: None,
        }
    }
}

impl ChatState {
    /// Missing or blank fields take neutral values.
    pub fn from_json(value: &Value, updated_at: TurnId) -> Self {
        let field = |key: &str, fallback: &str| {
            value[key]
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        Self {
            interaction: field("interaction", "other"),
            user_attitude: field("user_attitude", "neutral"),
            emotional_state: field("emotional_state", "calm"),
            leading_approach: field("leading_approach", "balanced"),
            updated_at: Some(updated_at),
        }
    }

    pub fn to_prompt(&self) -> String {
        format!(
            "{}\ninteraction: {}\nuser attitude: {}\nemotional state: {}\nleading approach: {}",
            CHAT_STATE_HEADER,
            self.interaction,
            self.user_attitude,
            self.emotional_state,
            self.leading_approach
        )
    }
}

pub struct ChatStateTracker {
    messages: Arc<dyn MessageStore>,
    oracle: Arc<dyn Oracle>,
    window: usize,
    state: RwLock<ChatState>,
    last_judged: Mutex<TurnId>,
}

impl ChatStateTracker {
    pub fn new(messages: Arc<dyn MessageStore>, oracle: Arc<dyn Oracle>, window: usize) -> Self {
        Self {
            messages,
            oracle,
            window: window.max(1),
            state: RwLock::new(ChatState::default()),
            last_judged: Mutex::new(0),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn state(&self) -> ChatState {
        self.state.read().clone()
    }

    /// Whether more than `window` turns separate `turn_id` from the last
    /// judgement.
    pub fn is_due(&self, turn_id: TurnId) -> bool {
        turn_id - *self.last_judged.lock() > self.window as TurnId
    }

    /// Re-judge the state if enough turns have passed. Returns whether a new
    /// judgement was stored.
    pub async fn check_and_update(&self, turn_id: TurnId) -> Result<bool> {
        if !self.is_due(turn_id) {
            return Ok(false);
        }
        self.update().await
    }

    /// Judge the state from the latest `window` messages now.
    ///
    /// Oracle failures and replies without JSON keep the previous state and
    /// leave the tracker due, so the next turn tries again. Store errors
    /// propagate.
    pub async fn update(&self) -> Result<bool> {
        let turns = self.messages.get_window(self.window).await?;
        let Some(newest) = turns.iter().rev().find_map(|m| m.turn_id) else {
            debug!("No stored turns, chat state unchanged");
            return Ok(false);
        };

        let prompt = OraclePrompt::JudgeChatState {
            dialogue_turns: render_turns(&turns),
        };
        let output = match self.oracle.invoke(&prompt).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Chat state judgement failed, keeping previous state");
                return Ok(false);
            }
        };
        let Some(value) = output.as_json() else {
            warn!("Chat state reply had no JSON, keeping previous state");
            return Ok(false);
        };

        let state = ChatState::from_json(value, newest);
        info!(
            turn_id = newest,
            interaction = %state.interaction,
            user_attitude = %state.user_attitude,
            emotional_state = %state.emotional_state,
            leading_approach = %state.leading_approach,
            "Chat state updated"
        );
        *self.state.write() = state;
        *self.last_judged.lock() = newest;
        Ok(true)
    }
}

impl std::fmt::Debug for ChatStateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStateTracker")
            .field("window", &self.window)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alice_core::ChatMessage;
    use alice_llm::{LLMOracle, LLMRegistry, MockLLMProvider};
    use serde_json::json;

    use crate::in_memory::InMemoryMessageStore;

    const TENSE: &str = r#"{"interaction": "task help", "user_attitude": "negative", "emotional_state": "tense", "leading_approach": "user-led"}"#;

    fn tracker(window: usize) -> (ChatStateTracker, InMemoryMessageStore, MockLLMProvider) {
        let messages = InMemoryMessageStore::new();
        let mock = MockLLMProvider::new("router");
        let oracle = LLMOracle::new(Arc::new(LLMRegistry::single(Arc::new(mock.clone()))));
        let tracker = ChatStateTracker::new(Arc::new(messages.clone()), Arc::new(oracle), window);
        (tracker, messages, mock)
    }

    async fn add_turns(store: &InMemoryMessageStore, n: usize) {
        for i in 0..n {
            store
                .append(ChatMessage::user(format!("turn {}", i)))
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let state = ChatState::from_json(&json!({"interaction": " role play ", "user_attitude": ""}), 9);
        assert_eq!(state.interaction, "role play");
        assert_eq!(state.user_attitude, "neutral");
        assert_eq!(state.emotional_state, "calm");
        assert_eq!(state.leading_approach, "balanced");
        assert_eq!(state.updated_at, Some(9));
    }

    #[test]
    fn test_to_prompt() {
        assert_eq!(
            ChatState::default().to_prompt(),
            "[Chat state]\ninteraction: small talk\nuser attitude: positive\nemotional state: calm\nleading approach: user-led"
        );
    }

    #[tokio::test]
    async fn test_waits_until_window_has_passed() {
        let (tracker, messages, mock) = tracker(4);
        add_turns(&messages, 4).await;

        assert!(!tracker.check_and_update(4).await.unwrap());
        assert_eq!(mock.call_count(), 0);
        assert_eq!(tracker.state(), ChatState::default());
    }

    #[tokio::test]
    async fn test_update_reads_window_and_resets_clock() {
        let (tracker, messages, mock) = tracker(4);
        add_turns(&messages, 6).await;
        mock.push_response(TENSE);

        assert!(tracker.check_and_update(6).await.unwrap());
        let state = tracker.state();
        assert_eq!(state.emotional_state, "tense");
        assert_eq!(state.updated_at, Some(6));

        let prompt = mock.last_call().unwrap().prompt();
        assert!(prompt.contains("[3] role:user content:turn 2"));
        assert!(!prompt.contains("content:turn 1\n"));

        assert!(!tracker.is_due(10));
        assert!(tracker.is_due(11));
    }

    #[tokio::test]
    async fn test_unusable_reply_keeps_state_and_stays_due() {
        let (tracker, messages, mock) = tracker(2);
        add_turns(&messages, 3).await;
        mock.push_response("The user seems fine.");
        mock.push_error("timeout");

        assert!(!tracker.check_and_update(3).await.unwrap());
        assert!(!tracker.check_and_update(3).await.unwrap());
        assert_eq!(tracker.state(), ChatState::default());
        assert!(tracker.is_due(3));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_history_skips_oracle() {
        let (tracker, _messages, mock) = tracker(1);
        assert!(!tracker.update().await.unwrap());
        assert_eq!(mock.call_count(), 0);
    }
}
