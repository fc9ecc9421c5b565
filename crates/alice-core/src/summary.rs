//! Dialogue summary records

use serde::{Deserialize, Serialize};

use crate::message::TurnId;

pub type SummaryId = i64;

/// One compressed memory block covering a contiguous span of turns.
///
/// `summary_id` is assigned by the [`SummaryStore`](crate::SummaryStore) on
/// create. `end_turn_id` may be unset while the span is still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_id: Option<SummaryId>,
    pub start_turn_id: TurnId,
    #[serde(default)]
    pub end_turn_id: Option<TurnId>,
    pub summary_text: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub turns_covered: usize,
}

impl DialogueSummary {
    pub fn new(start_turn_id: TurnId, summary_text: impl Into<String>) -> Self {
        Self {
            summary_id: None,
            start_turn_id,
            end_turn_id: None,
            summary_text: summary_text.into(),
            is_completed: false,
            turns_covered: 0,
        }
    }

    pub fn with_end(mut self, end_turn_id: TurnId) -> Self {
        self.end_turn_id = Some(end_turn_id);
        self
    }

    pub fn with_turns_covered(mut self, turns: usize) -> Self {
        self.turns_covered = turns;
        self
    }

    /// Last turn id this summary accounts for: the end of the span, or its
    /// start while the span is still open.
    pub fn covered_until(&self) -> TurnId {
        self.end_turn_id.unwrap_or(self.start_turn_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covered_until_falls_back_to_start() {
        let open = DialogueSummary::new(7, "open span");
        assert_eq!(open.covered_until(), 7);

        let closed = DialogueSummary::new(7, "closed span").with_end(12);
        assert_eq!(closed.covered_until(), 12);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{"start_turn_id": 3, "summary_text": "User likes tea."}"#;
        let summary: DialogueSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.summary_id, None);
        assert_eq!(summary.end_turn_id, None);
        assert!(!summary.is_completed);
        assert_eq!(summary.turns_covered, 0);
    }
}
