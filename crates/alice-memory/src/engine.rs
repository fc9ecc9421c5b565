//! Consolidation engine: windowed partitioning, decision, clamp and apply.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use alice_core::{
    AliceError, ChatMessage, DialogueSummary, MessageStore, Result, SummaryId, SummaryStore,
    TurnId,
};
use alice_llm::{Oracle, OracleOutput, OraclePrompt};

use crate::config::ConsolidationConfig;
use crate::decision::SummaryDecision;
use crate::policy::DecisionPolicy;
use crate::render::{render_dialogue, render_summaries};

/// Stored in place of summary text that is empty or nearly so.
pub const EMPTY_SUMMARY_PLACEHOLDER: &str = "（无）";

const MIN_SUMMARY_CHARS: usize = 5;

/// Derived view of the stores for one pass. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowState {
    pub summarized_messages: Vec<ChatMessage>,
    pub unsummarized_messages: Vec<ChatMessage>,
    pub recent_summaries: Vec<DialogueSummary>,
}

impl WindowState {
    /// Last turn id covered by the newest summary, if any.
    pub fn last_summary_end(&self) -> Option<TurnId> {
        self.recent_summaries.last().map(DialogueSummary::covered_until)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created(SummaryId),
    Updated(SummaryId),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub decision: SummaryDecision,
    pub applied: Option<ApplyOutcome>,
    pub recent_summaries: Vec<DialogueSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyAction {
    New,
    Update,
}

/// Parsed reply of the summarisation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SummaryReply {
    action: ReplyAction,
    summary_id: Option<SummaryId>,
    content: String,
}

impl SummaryReply {
    fn from_json(value: &Value) -> Option<Self> {
        let action = match value["action"].as_str()?.trim().to_lowercase().as_str() {
            "new" => ReplyAction::New,
            "update" | "merge" => ReplyAction::Update,
            _ => return None,
        };
        let summary_id = match &value["summary_id"] {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        let content = value["summary_content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Some(Self {
            action,
            summary_id,
            content,
        })
    }
}

/// Trim summary text; near-empty output becomes the placeholder.
pub fn normalize_summary_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_SUMMARY_CHARS {
        EMPTY_SUMMARY_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Clamp an untrusted split index into `[0, buffer_len - 1]`, then raise it
/// so the batch covers at least `min_raw_for_summary` messages where the
/// buffer allows. `None` for an empty buffer.
pub fn clamp_split_index(
    split_index: usize,
    buffer_len: usize,
    min_raw_for_summary: usize,
) -> Option<usize> {
    let max_index = buffer_len.checked_sub(1)?;
    let floor = min_raw_for_summary.saturating_sub(1).min(max_index);
    Some(split_index.min(max_index).max(floor))
}

pub struct ConsolidationEngine {
    messages: Arc<dyn MessageStore>,
    summaries: Arc<dyn SummaryStore>,
    policy: DecisionPolicy,
    oracle: Arc<dyn Oracle>,
    config: ConsolidationConfig,
    window: RwLock<WindowState>,
}

impl ConsolidationEngine {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        summaries: Arc<dyn SummaryStore>,
        oracle: Arc<dyn Oracle>,
        config: ConsolidationConfig,
    ) -> Self {
        let policy = DecisionPolicy::new(oracle.clone(), config.min_raw_for_summary);
        Self {
            messages,
            summaries,
            policy,
            oracle,
            config,
            window: RwLock::new(WindowState::default()),
        }
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// The window as of the last refresh.
    pub fn window(&self) -> WindowState {
        self.window.read().clone()
    }

    pub fn recent_summaries(&self) -> Vec<DialogueSummary> {
        self.window.read().recent_summaries.clone()
    }

    /// Re-read both stores and re-partition the message window.
    pub async fn refresh(&self) -> Result<WindowState> {
        let recent_summaries = self.summaries.get_window(self.config.summary_window).await?;
        let recent_messages = self.messages.get_window(self.config.history_window).await?;

        let last_end = recent_summaries.last().map(DialogueSummary::covered_until);

        let (summarized_messages, mut unsummarized_messages): (Vec<_>, Vec<_>) = recent_messages
            .into_iter()
            .partition(|m| matches!((m.turn_id, last_end), (Some(id), Some(end)) if id <= end));

        let cap = self.config.raw_buffer_cap();
        if unsummarized_messages.len() > cap {
            let dropped = unsummarized_messages.len() - cap;
            debug!(dropped, cap, "Unsummarized buffer over cap, dropping oldest");
            unsummarized_messages.drain(..dropped);
        }

        let state = WindowState {
            summarized_messages,
            unsummarized_messages,
            recent_summaries,
        };
        *self.window.write() = state.clone();
        Ok(state)
    }

    /// One consolidation pass: refresh, decide, clamp, apply, refresh.
    pub async fn ingest(&self) -> Result<IngestOutcome> {
        let window = self.refresh().await?;

        let decision = self
            .policy
            .should_consider_summarize(
                &window.summarized_messages,
                &window.unsummarized_messages,
                &window.recent_summaries,
            )
            .await?;

        info!(
            decision = %decision.kind(),
            action = %decision.summary_action(),
            split_index = ?decision.split_index(),
            reason = decision.reason(),
            "Consolidation decision"
        );

        let (decision, applied) = match decision.split_index() {
            Some(suggested) if decision.is_summarize() => {
                match clamp_split_index(
                    suggested,
                    window.unsummarized_messages.len(),
                    self.config.min_raw_for_summary,
                ) {
                    Some(split_index) => {
                        if split_index != suggested {
                            warn!(suggested, split_index, "Adjusted split index");
                        }
                        let applied = self.apply_summary_decision(&window, split_index).await?;
                        self.refresh().await?;
                        (decision.with_split_index(split_index)?, Some(applied))
                    }
                    None => (decision, None),
                }
            }
            _ => (decision, None),
        };

        Ok(IngestOutcome {
            decision,
            applied,
            recent_summaries: self.recent_summaries(),
        })
    }

    /// Fold `unsummarized_messages[..=split_index]` into a summary.
    ///
    /// Oracle and store errors propagate. A reply that cannot be applied
    /// (not JSON, unknown action, unresolvable id) is skipped with a warning
    /// and leaves the buffer for the next pass.
    pub async fn apply_summary_decision(
        &self,
        window: &WindowState,
        split_index: usize,
    ) -> Result<ApplyOutcome> {
        let Some(current) = window.unsummarized_messages.get(split_index) else {
            return Err(AliceError::Decision(format!(
                "split index {} outside buffer of {}",
                split_index,
                window.unsummarized_messages.len()
            )));
        };
        let batch = &window.unsummarized_messages[..=split_index];

        let prompt = OraclePrompt::SummarizeDialogue {
            summary_text: render_summaries(&window.recent_summaries),
            dialogues_text: render_dialogue(&window.summarized_messages, batch),
        };
        let output = self.oracle.invoke(&prompt).await?;

        let reply = match &output {
            OracleOutput::Json(value) => SummaryReply::from_json(value),
            OracleOutput::Text(_) => None,
        };
        let Some(reply) = reply else {
            warn!("Summarization reply unusable, skipping apply");
            return Ok(ApplyOutcome::Skipped("unusable summarization reply".into()));
        };

        let text = normalize_summary_text(&reply.content);
        let turns_covered = split_index + 1;

        match reply.action {
            ReplyAction::New => {
                let start = batch.first().and_then(|m| m.turn_id).unwrap_or(-1);
                let mut summary = DialogueSummary::new(start, text).with_turns_covered(turns_covered);
                summary.end_turn_id = current.turn_id;

                let summary_id = self.summaries.create(summary).await?;
                info!(summary_id, start_turn_id = start, end_turn_id = ?current.turn_id, "Created summary");
                Ok(ApplyOutcome::Created(summary_id))
            }
            ReplyAction::Update => {
                // Only the newest summary may grow, or it would overlap a later one.
                let newest = window.recent_summaries.last().and_then(|s| s.summary_id);
                if reply.summary_id.is_some() && reply.summary_id != newest {
                    warn!(
                        summary_id = ?reply.summary_id,
                        newest = ?newest,
                        "Update targets an older summary, skipping apply"
                    );
                    return Ok(ApplyOutcome::Skipped(format!(
                        "summary {:?} is not the newest",
                        reply.summary_id
                    )));
                }

                let existing = match reply.summary_id {
                    Some(id) => self.summaries.get_by_id(id).await?,
                    None => None,
                };
                let Some(mut summary) = existing else {
                    warn!(
                        summary_id = ?reply.summary_id,
                        "Update refers to no existing summary, skipping apply"
                    );
                    return Ok(ApplyOutcome::Skipped(format!(
                        "unknown summary id {:?}",
                        reply.summary_id
                    )));
                };

                summary.summary_text = text;
                summary.end_turn_id = current.turn_id;
                summary.turns_covered = turns_covered;
                self.summaries.update(&summary).await?;

                let summary_id = summary.summary_id.unwrap_or_default();
                info!(summary_id, end_turn_id = ?current.turn_id, "Updated summary");
                Ok(ApplyOutcome::Updated(summary_id))
            }
        }
    }
}
