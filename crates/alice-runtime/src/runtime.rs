use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use alice_core::{
    AliceError, ChatMessage, DialogueSummary, MessageStore, Result, SummaryStore, TurnId,
};
use alice_llm::LLMRegistry;
use alice_memory::{ChatState, ChatStateTracker, ConsolidationScheduler, IngestOutcome};

use crate::context::ContextAssembler;
use crate::post_turn::PostTurnProcessor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliceResponse {
    pub content: String,
    pub user_turn_id: TurnId,
    pub assistant_turn_id: TurnId,
    /// Whether this turn started a background consolidation pass.
    pub consolidation_scheduled: bool,
    /// Whether the chat state was re-judged after this turn.
    #[serde(default)]
    pub chat_state_updated: bool,
}

pub struct Alice {
    name: String,
    llm_registry: Arc<LLMRegistry>,
    messages: Arc<dyn MessageStore>,
    summaries: Arc<dyn SummaryStore>,
    context: ContextAssembler,
    post_turn: PostTurnProcessor,
    summary_window: usize,
    turn_lock: Mutex<()>,
}

impl std::fmt::Debug for Alice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alice")
            .field("name", &self.name)
            .field("llm_registry", &self.llm_registry)
            .field("runner", &self.post_turn.scheduler().runner_name())
            .finish_non_exhaustive()
    }
}

impl Alice {
    pub fn new(
        name: impl Into<String>,
        llm_registry: Arc<LLMRegistry>,
        messages: Arc<dyn MessageStore>,
        summaries: Arc<dyn SummaryStore>,
        context: ContextAssembler,
        scheduler: Arc<ConsolidationScheduler>,
    ) -> Self {
        let summary_window = scheduler.engine().config().summary_window;
        Self {
            name: name.into(),
            llm_registry,
            messages,
            summaries,
            context,
            post_turn: PostTurnProcessor::new(scheduler),
            summary_window,
            turn_lock: Mutex::new(()),
        }
    }

    /// Track the chat state after each turn and show it to the chat model.
    pub fn with_chat_state(mut self, tracker: Arc<ChatStateTracker>) -> Self {
        self.context = self.context.with_chat_state(tracker.clone());
        self.post_turn = self.post_turn.with_chat_state(tracker);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn llm_registry(&self) -> &Arc<LLMRegistry> {
        &self.llm_registry
    }

    pub fn scheduler(&self) -> &Arc<ConsolidationScheduler> {
        self.post_turn.scheduler()
    }

    pub fn system_prompt(&self) -> &str {
        self.context.system_prompt()
    }

    /// One conversational turn. The user message is only kept if the model
    /// produced a reply.
    #[instrument(skip(self, input), fields(agent = %self.name))]
    pub async fn chat(&self, input: &str) -> Result<AliceResponse> {
        if input.trim().is_empty() {
            return Err(AliceError::Other("Input cannot be empty".into()));
        }

        let _turn = self.turn_lock.lock().await;

        let user_turn_id = self.messages.append(ChatMessage::user(input)).await?;
        debug!(turn_id = user_turn_id, "Stored user message");

        let reply = match self.respond().await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(turn_id = user_turn_id, error = %e, "Chat failed, rolling back user message");
                if let Err(rollback) = self.messages.delete_by_id(user_turn_id).await {
                    error!(turn_id = user_turn_id, error = %rollback, "Rollback failed");
                }
                return Err(e);
            }
        };

        let assistant_turn_id = self
            .messages
            .append(ChatMessage::assistant(reply.clone()))
            .await?;

        let post_turn = self
            .post_turn
            .on_assistant_response(Some(assistant_turn_id))
            .await;
        info!(
            user_turn_id,
            assistant_turn_id,
            consolidation_scheduled = post_turn.consolidation_scheduled,
            chat_state_updated = post_turn.chat_state_updated,
            "Turn complete"
        );

        Ok(AliceResponse {
            content: reply,
            user_turn_id,
            assistant_turn_id,
            consolidation_scheduled: post_turn.consolidation_scheduled,
            chat_state_updated: post_turn.chat_state_updated,
        })
    }

    async fn respond(&self) -> Result<String> {
        let context = self.context.assemble().await?;
        let llm = self.llm_registry.default()?;
        let response = llm.complete(&context, None).await?;
        Ok(response.content.trim().to_string())
    }

    /// Most recent summaries as currently persisted, oldest first.
    pub async fn summaries(&self) -> Result<Vec<DialogueSummary>> {
        self.summaries.get_window(self.summary_window).await
    }

    /// `None` when chat state tracking is off.
    pub fn chat_state(&self) -> Option<ChatState> {
        self.post_turn.chat_state().map(|tracker| tracker.state())
    }

    pub async fn history(&self, n: usize) -> Result<Vec<ChatMessage>> {
        self.messages.get_window(n).await
    }

    /// Run a consolidation pass now, unless one is already in flight.
    pub async fn consolidate_now(&self) -> Result<Option<IngestOutcome>> {
        self.post_turn.scheduler().run_inline().await
    }
}
