//! Dialogue memory consolidation for the Alice agent
//!
//! After each assistant turn the [`ConsolidationScheduler`] starts at most one
//! background pass of the [`ConsolidationEngine`], which asks the
//! [`DecisionPolicy`] whether the recent raw messages should be folded into a
//! [`DialogueSummary`](alice_core::DialogueSummary) and applies the result.
//! The [`ChatStateTracker`] keeps a coarser label of how the conversation is
//! going.

mod chat_state;
mod config;
mod decision;
mod engine;
mod in_memory;
mod policy;
pub mod render;
mod scheduler;

pub use chat_state::{ChatState, ChatStateTracker};
pub use config::{ChatStateConfig, ConsolidationConfig};
pub use decision::{DecisionError, DecisionType, SummaryAction, SummaryDecision};
pub use engine::{
    ApplyOutcome, ConsolidationEngine, EMPTY_SUMMARY_PLACEHOLDER, IngestOutcome, WindowState,
    clamp_split_index, normalize_summary_text,
};
pub use in_memory::{InMemoryMessageStore, InMemorySummaryStore};
pub use policy::{DecisionPolicy, NeedJudgement};
pub use scheduler::{
    BackgroundRunner, ConsolidationScheduler, ThreadRunner, TokioTaskRunner, select_runner,
};
