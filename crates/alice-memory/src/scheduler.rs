//! Fire-and-forget consolidation with at most one pass in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use alice_core::Result;

use crate::engine::{ConsolidationEngine, IngestOutcome};

/// Where background consolidation jobs run.
pub trait BackgroundRunner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start `job` without waiting for it. If the job cannot be started it
    /// must be dropped, not leaked.
    fn spawn(&self, job: BoxFuture<'static, ()>);
}

/// Runs jobs as tasks on an existing tokio runtime.
pub struct TokioTaskRunner {
    handle: Handle,
}

impl TokioTaskRunner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Runner for the runtime the caller is on, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl BackgroundRunner for TokioTaskRunner {
    fn name(&self) -> &'static str {
        "tokio-task"
    }

    fn spawn(&self, job: BoxFuture<'static, ()>) {
        self.handle.spawn(job);
    }
}

/// Runs each job on a dedicated OS thread with its own single-threaded runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRunner;

impl BackgroundRunner for ThreadRunner {
    fn name(&self) -> &'static str {
        "worker-thread"
    }

    fn spawn(&self, job: BoxFuture<'static, ()>) {
        let spawned = std::thread::Builder::new()
            .name("alice-consolidation".into())
            .spawn(move || {
                match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime.block_on(job),
                    Err(e) => error!(error = %e, "Failed to start consolidation runtime"),
                }
            });
        if let Err(e) = spawned {
            error!(error = %e, "Failed to spawn consolidation thread");
        }
    }
}

/// Tokio task runner when called inside a runtime, worker thread otherwise.
pub fn select_runner() -> Arc<dyn BackgroundRunner> {
    match TokioTaskRunner::current() {
        Some(runner) => Arc::new(runner),
        None => Arc::new(ThreadRunner),
    }
}

/// Clears the in-flight flag when the job finishes, fails, panics or is
/// dropped unstarted.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ConsolidationScheduler {
    engine: Arc<ConsolidationEngine>,
    runner: Arc<dyn BackgroundRunner>,
    in_progress: Arc<AtomicBool>,
}

impl ConsolidationScheduler {
    /// Picks the runner once, from the calling context.
    pub fn new(engine: Arc<ConsolidationEngine>) -> Self {
        Self::with_runner(engine, select_runner())
    }

    pub fn with_runner(engine: Arc<ConsolidationEngine>, runner: Arc<dyn BackgroundRunner>) -> Self {
        Self {
            engine,
            runner,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn engine(&self) -> &Arc<ConsolidationEngine> {
        &self.engine
    }

    pub fn runner_name(&self) -> &'static str {
        self.runner.name()
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<InFlightGuard> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(self.in_progress.clone()))
    }

    /// Start a background pass unless one is already running. Returns
    /// whether a pass was started. Never blocks on the pass itself.
    pub fn trigger(&self) -> bool {
        let Some(guard) = self.try_acquire() else {
            debug!("Consolidation already in progress, skipping");
            return false;
        };

        let engine = self.engine.clone();
        let runner = self.runner.name();
        debug!(runner, "Scheduling consolidation");

        self.runner.spawn(Box::pin(async move {
            let _guard = guard;
            match engine.ingest().await {
                Ok(outcome) => info!(
                    runner,
                    decision = %outcome.decision.kind(),
                    applied = ?outcome.applied,
                    summaries = outcome.recent_summaries.len(),
                    "Consolidation finished"
                ),
                Err(e) => error!(runner, error = %e, "Background consolidation failed"),
            }
        }));
        true
    }

    /// Run a pass on the caller's task, honouring the same in-flight flag.
    /// `None` when another pass is running.
    pub async fn run_inline(&self) -> Result<Option<IngestOutcome>> {
        let Some(_guard) = self.try_acquire() else {
            debug!("Consolidation already in progress, skipping inline run");
            return Ok(None);
        };
        self.engine.ingest().await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use alice_core::{AliceError, ChatMessage, MessageStore, TurnId};
    use alice_llm::{LLMOracle, LLMRegistry, MockLLMProvider};

    use crate::config::ConsolidationConfig;
    use crate::in_memory::{InMemoryMessageStore, InMemorySummaryStore};

    async fn seeded_engine(mock: &MockLLMProvider, turns: usize) -> Arc<ConsolidationEngine> {
        let messages = InMemoryMessageStore::new();
        for i in 0..turns {
            messages
                .append(ChatMessage::user(format!("turn {}", i)))
                .await
                .unwrap();
        }
        let oracle = LLMOracle::new(Arc::new(LLMRegistry::single(Arc::new(mock.clone()))));
        Arc::new(ConsolidationEngine::new(
            Arc::new(messages),
            Arc::new(InMemorySummaryStore::new()),
            Arc::new(oracle),
            ConsolidationConfig::default(),
        ))
    }

    async fn wait_idle(scheduler: &ConsolidationScheduler) {
        for _ in 0..200 {
            if !scheduler.is_in_progress() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("consolidation did not finish");
    }

    #[tokio::test]
    async fn test_second_trigger_is_noop_while_running() {
        let mock = MockLLMProvider::new("oracle");
        mock.set_fallback(r#"{"need_summary": false, "summary_action": "none"}"#);
        mock.set_latency(Duration::from_millis(50));
        let scheduler = ConsolidationScheduler::new(seeded_engine(&mock, 5).await);
        assert_eq!(scheduler.runner_name(), "tokio-task");

        assert!(scheduler.trigger());
        assert!(!scheduler.trigger());
        assert!(scheduler.is_in_progress());

        wait_idle(&scheduler).await;
        assert_eq!(mock.call_count(), 1);

        assert!(scheduler.trigger());
        wait_idle(&scheduler).await;
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_inline_run_respects_flag() {
        let mock = MockLLMProvider::new("oracle");
        mock.set_fallback(r#"{"need_summary": false}"#);
        mock.set_latency(Duration::from_millis(50));
        let scheduler = ConsolidationScheduler::new(seeded_engine(&mock, 5).await);

        assert!(scheduler.trigger());
        assert!(scheduler.run_inline().await.unwrap().is_none());

        wait_idle(&scheduler).await;
        let outcome = scheduler.run_inline().await.unwrap().unwrap();
        assert!(!outcome.decision.is_summarize());
        assert!(!scheduler.is_in_progress());
    }

    struct BrokenStore;

    #[async_trait]
    impl MessageStore for BrokenStore {
        async fn get_window(&self, _n: usize) -> Result<Vec<ChatMessage>> {
            Err(AliceError::Storage("disk gone".into()))
        }
        async fn get_by_id(&self, _turn_id: TurnId) -> Result<Option<ChatMessage>> {
            Ok(None)
        }
        async fn append(&self, _message: ChatMessage) -> Result<TurnId> {
            Err(AliceError::Storage("disk gone".into()))
        }
        async fn delete_by_id(&self, _turn_id: TurnId) -> Result<()> {
            Ok(())
        }
        async fn len(&self) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_failed_pass_clears_flag() {
        let mock = MockLLMProvider::new("oracle");
        let oracle = LLMOracle::new(Arc::new(LLMRegistry::single(Arc::new(mock.clone()))));
        let engine = Arc::new(ConsolidationEngine::new(
            Arc::new(BrokenStore),
            Arc::new(InMemorySummaryStore::new()),
            Arc::new(oracle),
            ConsolidationConfig::default(),
        ));
        let scheduler = ConsolidationScheduler::new(engine);

        assert!(scheduler.trigger());
        wait_idle(&scheduler).await;
        assert!(scheduler.trigger());
        wait_idle(&scheduler).await;
        assert_eq!(mock.call_count(), 0);
    }

    struct DroppingRunner;

    impl BackgroundRunner for DroppingRunner {
        fn name(&self) -> &'static str {
            "dropping"
        }

        fn spawn(&self, job: BoxFuture<'static, ()>) {
            drop(job);
        }
    }

    #[tokio::test]
    async fn test_dropped_job_clears_flag() {
        let mock = MockLLMProvider::new("oracle");
        let scheduler =
            ConsolidationScheduler::with_runner(seeded_engine(&mock, 5).await, Arc::new(DroppingRunner));

        assert!(scheduler.trigger());
        assert!(!scheduler.is_in_progress());
        assert!(scheduler.trigger());
    }

    #[test]
    fn test_thread_runner_outside_runtime() {
        let mock = MockLLMProvider::new("oracle");
        mock.set_fallback(r#"{"need_summary": false, "summary_action": "none"}"#);
        mock.set_latency(Duration::from_millis(100));

        let engine = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(seeded_engine(&mock, 5));

        let scheduler = ConsolidationScheduler::new(engine);
        assert_eq!(scheduler.runner_name(), "worker-thread");

        assert!(scheduler.trigger());
        assert!(!scheduler.trigger());

        for _ in 0..400 {
            if !scheduler.is_in_progress() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!scheduler.is_in_progress());
        assert_eq!(mock.call_count(), 1);
    }
}
