//! LLM providers, prompt catalogue and oracle for the Alice agent

pub mod mock;
pub mod oracle;
pub mod prompts;
pub mod providers;
pub mod registry;
mod util;

pub use alice_core::{
    ChatMessage, FinishReason, LLMConfig, LLMError, LLMProvider, LLMResponse, Role,
    TokenUsage,
};
pub use mock::{MockCall, MockLLMProvider};
pub use oracle::{LLMOracle, Oracle, OracleOutput};
pub use prompts::{OracleConfig, OraclePrompt, PromptKind, PromptSettings};
pub use registry::LLMRegistry;
pub use util::extract_json;
