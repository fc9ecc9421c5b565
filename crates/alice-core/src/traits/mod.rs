//! Core traits for the Alice agent

pub mod llm;
pub mod store;

pub use llm::LLMProvider;
pub use store::{MessageStore, SummaryStore};
