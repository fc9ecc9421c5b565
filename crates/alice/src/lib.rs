//! Alice: a conversational companion with long-term dialogue memory

pub mod agent {
    pub use alice_runtime::{
        Alice, AliceBuilder, AliceResponse, ContextAssembler, PostTurnOutcome, PostTurnProcessor,
        memory_block,
    };
}

pub mod error {
    pub use alice_core::{AliceError, Result};
}

pub mod llm {
    pub use alice_core::{
        ChatMessage, FinishReason, LLMConfig, LLMError, LLMProvider, LLMResponse, Role,
        TokenUsage,
    };
    pub use alice_llm::{
        LLMOracle, LLMRegistry, MockCall, MockLLMProvider, Oracle, OracleConfig, OracleOutput,
        OraclePrompt, PromptKind, PromptSettings, extract_json,
    };

    pub mod providers {
        pub use alice_llm::providers::{ProviderBuilder, ProviderType, UnifiedLLMProvider};
    }
}

pub mod memory {
    pub use alice_core::{DialogueSummary, MessageStore, SummaryId, SummaryStore, TurnId};
    pub use alice_memory::render;
    pub use alice_memory::{
        ApplyOutcome, BackgroundRunner, ChatState, ChatStateConfig, ChatStateTracker,
        ConsolidationConfig, ConsolidationEngine,
        ConsolidationScheduler, DecisionError, DecisionPolicy, DecisionType,
        EMPTY_SUMMARY_PLACEHOLDER, InMemoryMessageStore, InMemorySummaryStore, IngestOutcome,
        NeedJudgement, SummaryAction, SummaryDecision, ThreadRunner, TokioTaskRunner,
        WindowState, clamp_split_index, normalize_summary_text, select_runner,
    };
}

pub mod persistence {
    #[cfg(feature = "sqlite")]
    pub use alice_storage::SqliteChatStore;
    pub use alice_storage::{ChatStores, StorageConfig, create_stores};
}

pub mod spec {
    pub use alice_runtime::spec::{AliceSpec, LLMSelector, LLMSpec};
}

pub use agent::{Alice, AliceBuilder, AliceResponse};
pub use error::{AliceError, Result};
pub use spec::AliceSpec;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_facade_round_trip() {
        let mock = llm::MockLLMProvider::new("chat");
        mock.push_response("Nice to meet you.");

        let alice = AliceBuilder::from_yaml("name: Alice\nhistory_window: 4")
            .unwrap()
            .llm(Arc::new(mock))
            .runner(Arc::new(memory::ThreadRunner))
            .build()
            .unwrap();

        let response = alice.chat("Hello").await.unwrap();
        assert_eq!(response.content, "Nice to meet you.");
        assert_eq!(response.assistant_turn_id, 2);
    }
}
