//! Core types and traits for the Alice conversational agent

pub mod error;
pub mod message;
pub mod summary;
pub mod traits;
pub mod types;

pub use error::{AliceError, Result};
pub use message::{ChatMessage, Role, TurnId};
pub use summary::{DialogueSummary, SummaryId};
pub use traits::llm::{LLMError, LLMProvider};
pub use traits::store::{MessageStore, SummaryStore};
pub use types::{FinishReason, LLMConfig, LLMResponse, TokenUsage};
