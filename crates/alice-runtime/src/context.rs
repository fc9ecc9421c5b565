//! Prompt assembly for the chat model

use std::sync::Arc;

use tracing::debug;

use alice_core::{ChatMessage, DialogueSummary, MessageStore, Result, SummaryStore};
use alice_memory::ChatStateTracker;

const MEMORY_HEADER: &str = "[Dialogue memory]";

/// Builds the message list sent to the chat model: persona, the recent
/// dialogue summaries, the chat state when tracked, then the newest raw turns.
pub struct ContextAssembler {
    system_prompt: String,
    messages: Arc<dyn MessageStore>,
    summaries: Arc<dyn SummaryStore>,
    chat_state: Option<Arc<ChatStateTracker>>,
    history_window: usize,
    summary_window: usize,
}

impl ContextAssembler {
    pub fn new(
        system_prompt: impl Into<String>,
        messages: Arc<dyn MessageStore>,
        summaries: Arc<dyn SummaryStore>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            summaries,
            chat_state: None,
            history_window: 20,
            summary_window: 4,
        }
    }

    pub fn with_history_window(mut self, n: usize) -> Self {
        self.history_window = n;
        self
    }

    pub fn with_summary_window(mut self, n: usize) -> Self {
        self.summary_window = n;
        self
    }

    pub fn with_chat_state(mut self, tracker: Arc<ChatStateTracker>) -> Self {
        self.chat_state = Some(tracker);
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn assemble(&self) -> Result<Vec<ChatMessage>> {
        let summaries = self.summaries.get_window(self.summary_window).await?;
        let history = self.messages.get_window(self.history_window).await?;

        let mut context = Vec::with_capacity(history.len() + 3);
        context.push(ChatMessage::system(&self.system_prompt));
        if let Some(block) = memory_block(&summaries) {
            context.push(ChatMessage::system(block));
        }
        if let Some(ref tracker) = self.chat_state {
            context.push(ChatMessage::system(tracker.state().to_prompt()));
        }
        context.extend(history);

        debug!(
            summaries = summaries.len(),
            messages = context.len(),
            "Assembled chat context"
        );
        Ok(context)
    }
}

/// `None` when there is nothing worth showing.
pub fn memory_block(summaries: &[DialogueSummary]) -> Option<String> {
    let lines: Vec<String> = summaries
        .iter()
        .filter(|s| !s.summary_text.trim().is_empty())
        .enumerate()
        .map(|(i, s)| format!("[{}] {}", i + 1, s.summary_text.trim()))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(format!("{}\n{}", MEMORY_HEADER, lines.join("\n")))
    }
}
