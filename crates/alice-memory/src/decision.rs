//! Validated outcome of one consolidation decision.

use serde::Serialize;
use thiserror::Error;

use alice_core::AliceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionType {
    Summarize,
    Skip,
    Wait,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Skip => "skip",
            Self::Wait => "wait",
        }
    }
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryAction {
    Merge,
    New,
    #[default]
    None,
}

impl SummaryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::New => "new",
            Self::None => "none",
        }
    }

    /// Case-insensitive parse; anything unrecognised is `None`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "merge" => Self::Merge,
            "new" => Self::New,
            _ => Self::None,
        }
    }
}

impl std::fmt::Display for SummaryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("decision reason must not be empty")]
    EmptyReason,

    #[error("summarize decision requires a split index")]
    MissingSplitIndex,

    #[error("summarize decision requires action merge or new, got {0}")]
    InvalidSummarizeAction(SummaryAction),

    #[error("{0} decision must not carry a split index")]
    UnexpectedSplitIndex(DecisionType),

    #[error("{kind} decision must not carry summary action {action}")]
    UnexpectedAction {
        kind: DecisionType,
        action: SummaryAction,
    },
}

impl From<DecisionError> for AliceError {
    fn from(err: DecisionError) -> Self {
        AliceError::Decision(err.to_string())
    }
}

/// A decision whose field combination has been checked on construction.
///
/// `split_index` is present exactly when the decision is `Summarize`, and the
/// action is then `Merge` or `New`; `Skip` and `Wait` always carry
/// `SummaryAction::None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryDecision {
    #[serde(rename = "type")]
    kind: DecisionType,
    reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    split_index: Option<usize>,
    summary_action: SummaryAction,
}

impl SummaryDecision {
    pub fn new(
        kind: DecisionType,
        reason: impl Into<String>,
        split_index: Option<usize>,
        summary_action: Option<SummaryAction>,
    ) -> Result<Self, DecisionError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(DecisionError::EmptyReason);
        }

        let summary_action = summary_action.unwrap_or_default();
        match kind {
            DecisionType::Summarize => {
                if split_index.is_none() {
                    return Err(DecisionError::MissingSplitIndex);
                }
                if summary_action == SummaryAction::None {
                    return Err(DecisionError::InvalidSummarizeAction(summary_action));
                }
            }
            DecisionType::Skip | DecisionType::Wait => {
                if split_index.is_some() {
                    return Err(DecisionError::UnexpectedSplitIndex(kind));
                }
                if summary_action != SummaryAction::None {
                    return Err(DecisionError::UnexpectedAction {
                        kind,
                        action: summary_action,
                    });
                }
            }
        }

        Ok(Self {
            kind,
            reason,
            split_index,
            summary_action,
        })
    }

    pub fn summarize(
        split_index: usize,
        action: SummaryAction,
        reason: impl Into<String>,
    ) -> Result<Self, DecisionError> {
        Self::new(
            DecisionType::Summarize,
            reason,
            Some(split_index),
            Some(action),
        )
    }

    pub fn skip(reason: impl Into<String>) -> Result<Self, DecisionError> {
        Self::new(DecisionType::Skip, reason, None, None)
    }

    pub fn wait(reason: impl Into<String>) -> Result<Self, DecisionError> {
        Self::new(DecisionType::Wait, reason, None, None)
    }

    /// Same decision with a different split index. Only meaningful for
    /// `Summarize`; other kinds reject it.
    pub fn with_split_index(&self, split_index: usize) -> Result<Self, DecisionError> {
        Self::new(
            self.kind,
            self.reason.clone(),
            Some(split_index),
            Some(self.summary_action),
        )
    }

    pub fn kind(&self) -> DecisionType {
        self.kind
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn split_index(&self) -> Option<usize> {
        self.split_index
    }

    pub fn summary_action(&self) -> SummaryAction {
        self.summary_action
    }

    pub fn is_summarize(&self) -> bool {
        self.kind == DecisionType::Summarize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_requires_split_index() {
        let err = SummaryDecision::new(
            DecisionType::Summarize,
            "need",
            None,
            Some(SummaryAction::New),
        )
        .unwrap_err();
        assert_eq!(err, DecisionError::MissingSplitIndex);
    }

    #[test]
    fn test_summarize_requires_merge_or_new() {
        assert!(SummaryDecision::summarize(2, SummaryAction::None, "x").is_err());
        assert!(
            SummaryDecision::new(DecisionType::Summarize, "x", Some(2), None).is_err()
        );
        let ok = SummaryDecision::summarize(2, SummaryAction::Merge, "x").unwrap();
        assert_eq!(ok.split_index(), Some(2));
        assert_eq!(ok.summary_action(), SummaryAction::Merge);
    }

    #[test]
    fn test_skip_rejects_real_action() {
        let err = SummaryDecision::new(DecisionType::Skip, "no", None, Some(SummaryAction::Merge))
            .unwrap_err();
        assert!(matches!(err, DecisionError::UnexpectedAction { .. }));

        let ok =
            SummaryDecision::new(DecisionType::Skip, "no", None, Some(SummaryAction::None)).unwrap();
        assert_eq!(ok.summary_action(), SummaryAction::None);
    }

    #[test]
    fn test_wait_rejects_split_index() {
        let err = SummaryDecision::new(DecisionType::Wait, "small", Some(0), None).unwrap_err();
        assert_eq!(err, DecisionError::UnexpectedSplitIndex(DecisionType::Wait));
    }

    #[test]
    fn test_empty_reason_rejected() {
        assert_eq!(
            SummaryDecision::wait("  ").unwrap_err(),
            DecisionError::EmptyReason
        );
    }

    #[test]
    fn test_with_split_index_keeps_kind() {
        let decision = SummaryDecision::summarize(7, SummaryAction::New, "new topic").unwrap();
        let clamped = decision.with_split_index(3).unwrap();
        assert_eq!(clamped.split_index(), Some(3));
        assert_eq!(clamped.reason(), "new topic");

        let skip = SummaryDecision::skip("nothing").unwrap();
        assert!(skip.with_split_index(1).is_err());
    }

    #[test]
    fn test_lenient_action_parse() {
        assert_eq!(SummaryAction::parse_lenient(" MERGE "), SummaryAction::Merge);
        assert_eq!(SummaryAction::parse_lenient("New"), SummaryAction::New);
        assert_eq!(SummaryAction::parse_lenient("append"), SummaryAction::None);
    }

    #[test]
    fn test_decision_error_converts() {
        let err: AliceError = DecisionError::MissingSplitIndex.into();
        assert!(matches!(err, AliceError::Decision(_)));
    }
}
