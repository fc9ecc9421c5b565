//! Two-stage LLM-mediated consolidation policy.
//!
//! Stage one asks whether the unsummarised buffer needs consolidating at all
//! (and whether it extends the latest summary or starts a new one). Stage two
//! only runs for merges and asks how many leading turns continue the current
//! topic. Oracle failures and malformed replies never escape this module;
//! they degrade to "do nothing this round".

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use alice_core::{ChatMessage, DialogueSummary, Result};
use alice_llm::{Oracle, OracleOutput, OraclePrompt};

use crate::decision::{SummaryAction, SummaryDecision};
use crate::render::{render_dialogue, render_summaries};

/// Parsed reply of the need-summary judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeedJudgement {
    pub need_summary: bool,
    pub summary_action: SummaryAction,
}

impl NeedJudgement {
    fn from_json(value: &Value) -> Self {
        let need_summary = match &value["need_summary"] {
            Value::Bool(b) => *b,
            Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        };
        let summary_action = value["summary_action"]
            .as_str()
            .map(SummaryAction::parse_lenient)
            .unwrap_or_default();
        Self {
            need_summary,
            summary_action,
        }
    }
}

/// Read the continuation count from a reply, clamped to `[0, buffer_len]`.
/// Missing or non-numeric values count as 0.
fn continuation_from_json(value: &Value, buffer_len: usize) -> Option<usize> {
    let raw = value
        .get("continuation_turns")
        .or_else(|| value.get("index"))?;

    let count = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.floor() as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };

    Some(count.clamp(0, buffer_len as i64) as usize)
}

pub struct DecisionPolicy {
    oracle: Arc<dyn Oracle>,
    min_raw_for_summary: usize,
}

impl DecisionPolicy {
    pub fn new(oracle: Arc<dyn Oracle>, min_raw_for_summary: usize) -> Self {
        Self {
            oracle,
            min_raw_for_summary,
        }
    }

    pub fn min_raw_for_summary(&self) -> usize {
        self.min_raw_for_summary
    }

    pub async fn judge_need_summary(&self, summary_text: &str, buffer_text: &str) -> NeedJudgement {
        let prompt = OraclePrompt::JudgeDialogueSummary {
            summary_text: summary_text.to_string(),
            dialogues_text: buffer_text.to_string(),
        };

        match self.oracle.invoke(&prompt).await {
            Ok(OracleOutput::Json(value)) => {
                let judgement = NeedJudgement::from_json(&value);
                debug!(
                    need_summary = judgement.need_summary,
                    action = %judgement.summary_action,
                    "Need-summary judgement"
                );
                judgement
            }
            Ok(OracleOutput::Text(text)) => {
                warn!(reply = %text, "Need-summary judgement was not JSON, treating as no summary");
                NeedJudgement::default()
            }
            Err(e) => {
                warn!(error = %e, "Need-summary judgement failed, treating as no summary");
                NeedJudgement::default()
            }
        }
    }

    /// Number of leading buffer turns that still continue the current
    /// summary's topic. A count, not an index.
    pub async fn judge_topic_continuation(
        &self,
        summary_text: &str,
        buffer_text: &str,
        buffer_len: usize,
    ) -> usize {
        let prompt = OraclePrompt::SplitBufferByTopic {
            current_summary: summary_text.to_string(),
            dialogue_turns: buffer_text.to_string(),
        };

        match self.oracle.invoke(&prompt).await {
            Ok(OracleOutput::Json(value)) => match continuation_from_json(&value, buffer_len) {
                Some(count) => {
                    debug!(continuation_turns = count, buffer_len, "Topic continuation");
                    count
                }
                None => {
                    warn!(reply = %value, "Topic continuation reply had no usable count, using 0");
                    0
                }
            },
            Ok(OracleOutput::Text(text)) => {
                warn!(reply = %text, "Topic continuation reply was not JSON, using 0");
                0
            }
            Err(e) => {
                warn!(error = %e, "Topic continuation judgement failed, using 0");
                0
            }
        }
    }

    pub async fn should_consider_summarize(
        &self,
        summarized: &[ChatMessage],
        unsummarized: &[ChatMessage],
        recent_summaries: &[DialogueSummary],
    ) -> Result<SummaryDecision> {
        if unsummarized.len() < self.min_raw_for_summary {
            return Ok(SummaryDecision::wait(format!(
                "unsummarized {} < {}",
                unsummarized.len(),
                self.min_raw_for_summary
            ))?);
        }

        let summary_text = render_summaries(recent_summaries);
        let buffer_text = render_dialogue(summarized, unsummarized);
        let last_index = unsummarized.len() - 1;

        let judgement = self.judge_need_summary(&summary_text, &buffer_text).await;
        if !judgement.need_summary || judgement.summary_action == SummaryAction::None {
            return Ok(SummaryDecision::skip(format!(
                "need_summary={}, summary_action={}",
                judgement.need_summary, judgement.summary_action
            ))?);
        }

        if judgement.summary_action == SummaryAction::New {
            return Ok(SummaryDecision::summarize(
                last_index,
                SummaryAction::New,
                "summary_action=new",
            )?);
        }

        let count = self
            .judge_topic_continuation(&summary_text, &buffer_text, unsummarized.len())
            .await;

        if count == 0 {
            return Ok(SummaryDecision::summarize(
                last_index,
                SummaryAction::New,
                "merge requested but continuation_turns=0, starting a new summary",
            )?);
        }

        Ok(SummaryDecision::summarize(
            count - 1,
            SummaryAction::Merge,
            format!("merge continuation_turns={}", count),
        )?)
    }
}
