//! Storage traits for raw chat history and dialogue summaries

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{ChatMessage, TurnId};
use crate::summary::{DialogueSummary, SummaryId};

/// Append-only ordered store of chat messages.
///
/// Built-in backends: `InMemoryMessageStore` (alice-memory) and
/// `SqliteChatStore` (alice-storage).
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The most recent `n` messages in ascending turn order.
    async fn get_window(&self, n: usize) -> Result<Vec<ChatMessage>>;
    async fn get_by_id(&self, turn_id: TurnId) -> Result<Option<ChatMessage>>;
    /// Persist a message and return the turn id the store assigned to it.
    /// Any `turn_id` already set on `message` is ignored.
    async fn append(&self, message: ChatMessage) -> Result<TurnId>;
    /// Remove a message. Used only to roll back a failed turn.
    async fn delete_by_id(&self, turn_id: TurnId) -> Result<()>;
    async fn len(&self) -> Result<usize>;
}

/// Store of dialogue summaries keyed by summary id.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// The most recent `n` summaries in ascending id order.
    async fn get_window(&self, n: usize) -> Result<Vec<DialogueSummary>>;
    async fn get_by_id(&self, summary_id: SummaryId) -> Result<Option<DialogueSummary>>;
    /// Persist a new summary and return its assigned id.
    async fn create(&self, summary: DialogueSummary) -> Result<SummaryId>;
    /// Overwrite text, end turn and turn count of an existing summary.
    async fn update(&self, summary: &DialogueSummary) -> Result<()>;
    async fn len(&self) -> Result<usize>;
}
