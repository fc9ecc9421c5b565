//! Hooks run after the assistant reply has been stored

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use alice_core::TurnId;
use alice_memory::{ChatStateTracker, ConsolidationScheduler};

/// What one assistant turn set off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostTurnOutcome {
    pub consolidation_scheduled: bool,
    pub chat_state_updated: bool,
}

/// Kicks off consolidation and the chat state check once per assistant turn.
pub struct PostTurnProcessor {
    scheduler: Arc<ConsolidationScheduler>,
    chat_state: Option<Arc<ChatStateTracker>>,
    last_processed: Mutex<Option<TurnId>>,
}

impl PostTurnProcessor {
    pub fn new(scheduler: Arc<ConsolidationScheduler>) -> Self {
        Self {
            scheduler,
            chat_state: None,
            last_processed: Mutex::new(None),
        }
    }

    pub fn with_chat_state(mut self, tracker: Arc<ChatStateTracker>) -> Self {
        self.chat_state = Some(tracker);
        self
    }

    pub fn scheduler(&self) -> &Arc<ConsolidationScheduler> {
        &self.scheduler
    }

    pub fn chat_state(&self) -> Option<&Arc<ChatStateTracker>> {
        self.chat_state.as_ref()
    }

    pub fn last_processed(&self) -> Option<TurnId> {
        *self.last_processed.lock()
    }

    /// A turn id at or below the last one seen is a replay and is ignored.
    /// Missing or non-positive ids carry no ordering: they always trigger
    /// consolidation but never the chat state check.
    ///
    /// Chat state failures are logged and do not fail the turn.
    pub async fn on_assistant_response(&self, turn_id: Option<TurnId>) -> PostTurnOutcome {
        if let Some(id) = turn_id.filter(|id| *id > 0) {
            let mut last = self.last_processed.lock();
            if last.is_some_and(|seen| id <= seen) {
                debug!(turn_id = id, last = ?*last, "Turn already processed, skipping");
                return PostTurnOutcome::default();
            }
            *last = Some(id);
        }

        let consolidation_scheduled = self.scheduler.trigger();

        let chat_state_updated = match (&self.chat_state, turn_id.filter(|id| *id > 0)) {
            (Some(tracker), Some(id)) => match tracker.check_and_update(id).await {
                Ok(updated) => updated,
                Err(e) => {
                    warn!(turn_id = id, error = %e, "Chat state check failed");
                    false
                }
            },
            _ => false,
        };

        PostTurnOutcome {
            consolidation_scheduled,
            chat_state_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;

    use alice_core::{ChatMessage, MessageStore};
    use alice_llm::{LLMOracle, LLMRegistry, MockLLMProvider};
    use alice_memory::{
        BackgroundRunner, ConsolidationConfig, ConsolidationEngine, InMemoryMessageStore,
        InMemorySummaryStore,
    };

    /// Counts jobs and drops them unstarted.
    struct CountingRunner(Arc<AtomicUsize>);

    impl BackgroundRunner for CountingRunner {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn spawn(&self, job: BoxFuture<'static, ()>) {
            self.0.fetch_add(1, Ordering::SeqCst);
            drop(job);
        }
    }

    struct Fixture {
        processor: PostTurnProcessor,
        spawned: Arc<AtomicUsize>,
        messages: InMemoryMessageStore,
        oracle_mock: MockLLMProvider,
    }

    fn fixture(chat_state_window: Option<usize>) -> Fixture {
        let messages = InMemoryMessageStore::new();
        let oracle_mock = MockLLMProvider::new("oracle");
        let oracle = Arc::new(LLMOracle::new(Arc::new(LLMRegistry::single(Arc::new(
            oracle_mock.clone(),
        )))));
        let engine = Arc::new(ConsolidationEngine::new(
            Arc::new(messages.clone()),
            Arc::new(InMemorySummaryStore::new()),
            oracle.clone(),
            ConsolidationConfig::default(),
        ));
        let spawned = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(CountingRunner(spawned.clone()));
        let scheduler = ConsolidationScheduler::with_runner(engine, runner);

        let mut processor = PostTurnProcessor::new(Arc::new(scheduler));
        if let Some(window) = chat_state_window {
            let tracker = ChatStateTracker::new(Arc::new(messages.clone()), oracle, window);
            processor = processor.with_chat_state(Arc::new(tracker));
        }
        Fixture {
            processor,
            spawned,
            messages,
            oracle_mock,
        }
    }

    #[tokio::test]
    async fn test_replayed_turn_ids_are_ignored() {
        let f = fixture(None);
        let p = &f.processor;

        assert!(p.on_assistant_response(Some(2)).await.consolidation_scheduled);
        assert!(!p.on_assistant_response(Some(2)).await.consolidation_scheduled);
        assert!(!p.on_assistant_response(Some(1)).await.consolidation_scheduled);
        assert!(p.on_assistant_response(Some(4)).await.consolidation_scheduled);

        assert_eq!(p.last_processed(), Some(4));
        assert_eq!(f.spawned.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unordered_ids_always_trigger() {
        let f = fixture(None);
        let p = &f.processor;

        for id in [Some(5), None, Some(0), Some(-3)] {
            assert!(p.on_assistant_response(id).await.consolidation_scheduled);
        }

        assert_eq!(p.last_processed(), Some(5));
        assert_eq!(f.spawned.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_chat_state_checked_after_window() {
        let f = fixture(Some(2));
        for i in 0..4 {
            f.messages
                .append(ChatMessage::user(format!("turn {}", i)))
                .await
                .unwrap();
        }
        f.oracle_mock.push_response(
            r#"{"interaction": "question answering", "user_attitude": "neutral", "emotional_state": "calm", "leading_approach": "balanced"}"#,
        );

        let early = f.processor.on_assistant_response(Some(2)).await;
        assert!(early.consolidation_scheduled);
        assert!(!early.chat_state_updated);
        assert_eq!(f.oracle_mock.call_count(), 0);

        let due = f.processor.on_assistant_response(Some(4)).await;
        assert!(due.chat_state_updated);
        let tracker = f.processor.chat_state().unwrap();
        assert_eq!(tracker.state().interaction, "question answering");
        assert_eq!(tracker.state().updated_at, Some(4));

        let replay = f.processor.on_assistant_response(Some(4)).await;
        assert_eq!(replay, PostTurnOutcome::default());
        assert_eq!(f.oracle_mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_chat_state_failure_does_not_block_consolidation() {
        let f = fixture(Some(1));
        f.messages.append(ChatMessage::user("hi")).await.unwrap();
        f.messages.append(ChatMessage::assistant("hello")).await.unwrap();
        f.oracle_mock.push_error("router offline");

        let outcome = f.processor.on_assistant_response(Some(2)).await;
        assert!(outcome.consolidation_scheduled);
        assert!(!outcome.chat_state_updated);
        assert!(f.processor.on_assistant_response(None).await.consolidation_scheduled);
        assert_eq!(f.oracle_mock.call_count(), 1);
    }
}
