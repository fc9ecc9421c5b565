use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use alice_core::{
    AliceError, ChatMessage, DialogueSummary, MessageStore, Result, SummaryId, SummaryStore,
    TurnId,
};

struct MessageLog {
    messages: Vec<ChatMessage>,
    next_id: TurnId,
}

/// Process-local message store. Clones share the same log.
#[derive(Clone)]
pub struct InMemoryMessageStore {
    log: Arc<RwLock<MessageLog>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            log: Arc::new(RwLock::new(MessageLog {
                messages: Vec::new(),
                next_id: 1,
            })),
        }
    }

    pub fn all(&self) -> Vec<ChatMessage> {
        self.log.read().messages.clone()
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn get_window(&self, n: usize) -> Result<Vec<ChatMessage>> {
        let log = self.log.read();
        let start = log.messages.len().saturating_sub(n);
        Ok(log.messages[start..].to_vec())
    }

    async fn get_by_id(&self, turn_id: TurnId) -> Result<Option<ChatMessage>> {
        Ok(self
            .log
            .read()
            .messages
            .iter()
            .find(|m| m.turn_id == Some(turn_id))
            .cloned())
    }

    async fn append(&self, mut message: ChatMessage) -> Result<TurnId> {
        let mut log = self.log.write();
        let turn_id = log.next_id;
        log.next_id += 1;
        message.turn_id = Some(turn_id);
        log.messages.push(message);
        Ok(turn_id)
    }

    async fn delete_by_id(&self, turn_id: TurnId) -> Result<()> {
        self.log
            .write()
            .messages
            .retain(|m| m.turn_id != Some(turn_id));
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.log.read().messages.len())
    }
}

struct SummaryLog {
    summaries: Vec<DialogueSummary>,
    next_id: SummaryId,
}

/// Process-local summary store. Clones share the same records.
#[derive(Clone)]
pub struct InMemorySummaryStore {
    log: Arc<RwLock<SummaryLog>>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self {
            log: Arc::new(RwLock::new(SummaryLog {
                summaries: Vec::new(),
                next_id: 1,
            })),
        }
    }
}

impl Default for InMemorySummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn get_window(&self, n: usize) -> Result<Vec<DialogueSummary>> {
        let log = self.log.read();
        let start = log.summaries.len().saturating_sub(n);
        Ok(log.summaries[start..].to_vec())
    }

    async fn get_by_id(&self, summary_id: SummaryId) -> Result<Option<DialogueSummary>> {
        Ok(self
            .log
            .read()
            .summaries
            .iter()
            .find(|s| s.summary_id == Some(summary_id))
            .cloned())
    }

    async fn create(&self, mut summary: DialogueSummary) -> Result<SummaryId> {
        let mut log = self.log.write();
        let summary_id = log.next_id;
        log.next_id += 1;
        summary.summary_id = Some(summary_id);
        log.summaries.push(summary);
        Ok(summary_id)
    }

    async fn update(&self, summary: &DialogueSummary) -> Result<()> {
        let summary_id = summary
            .summary_id
            .ok_or_else(|| AliceError::Storage("cannot update a summary without an id".into()))?;

        let mut log = self.log.write();
        let existing = log
            .summaries
            .iter_mut()
            .find(|s| s.summary_id == Some(summary_id))
            .ok_or_else(|| AliceError::Storage(format!("summary {} not found", summary_id)))?;

        existing.summary_text = summary.summary_text.clone();
        existing.end_turn_id = summary.end_turn_id;
        existing.turns_covered = summary.turns_covered;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.log.read().summaries.len())
    }
}
