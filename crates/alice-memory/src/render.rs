//! Plain-text renderings of summaries and message windows fed to the oracle.

use alice_core::{ChatMessage, DialogueSummary};

pub const SUMMARIZED_SECTION: &str = "[Summarized messages]";
pub const UNSUMMARIZED_SECTION: &str = "[Unsummarized messages]";

/// One line per summary: `- [summary_id]<id>[summary_content]<text>`.
pub fn render_summaries(summaries: &[DialogueSummary]) -> String {
    summaries
        .iter()
        .map(|s| {
            let id = s.summary_id.map(|id| id.to_string()).unwrap_or_default();
            format!("- [summary_id]{}[summary_content]{}\n", id, s.summary_text)
        })
        .collect()
}

/// One line per message, numbered from 0 within the block.
pub fn render_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| format!("[{}] role:{} content:{}\n", i, m.role, m.content))
        .collect()
}

/// One line per message, labelled with its stored turn id.
pub fn render_turns(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let id = m.turn_id.map(|id| id.to_string()).unwrap_or_default();
            format!("[{}] role:{} content:{}\n", id, m.role, m.content)
        })
        .collect()
}

/// Summarised context (when there is any) followed by the unsummarised block.
pub fn render_dialogue(summarized: &[ChatMessage], unsummarized: &[ChatMessage]) -> String {
    let mut parts = Vec::with_capacity(4);
    if !summarized.is_empty() {
        parts.push(SUMMARIZED_SECTION.to_string());
        parts.push(render_messages(summarized));
    }
    parts.push(UNSUMMARIZED_SECTION.to_string());
    parts.push(render_messages(unsummarized));
    parts.join("\n").trim().to_string()
}
