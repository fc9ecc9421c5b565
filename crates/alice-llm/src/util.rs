/// Locate the JSON object inside an LLM reply.
///
/// Models wrap their answer in code fences or chatter around it; this peels
/// that off and returns the slice most likely to parse. Replies with no
/// braces come back trimmed and unchanged.
pub fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed;
    }

    if let Some(fenced) = fenced_block(trimmed) {
        if fenced.starts_with('{') {
            return fenced;
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_ticks = &text[start + 3..];
    let end = after_ticks.find("```")?;
    let block = &after_ticks[..end];
    // Drop the info string (`json`, `JSON`, ...) on the opening fence line.
    let body = match block.find('\n') {
        Some(newline) => &block[newline + 1..],
        None => block,
    };
    Some(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_raw() {
        let input = r#"{"need_summary": true}"#;
        assert_eq!(extract_json(input), input);
    }

    #[test]
    fn test_extract_json_with_markdown() {
        let input = "```json\n{\"action\": \"merge\"}\n```";
        assert_eq!(extract_json(input), r#"{"action": "merge"}"#);
    }

    #[test]
    fn test_extract_json_uppercase_fence() {
        let input = "Sure!\n```JSON\n{\"continuation_turns\": 2}\n```\nDone.";
        assert_eq!(extract_json(input), r#"{"continuation_turns": 2}"#);
    }

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let input = "Here is my verdict:\n{\"need_summary\": false}\nHope that helps.";
        assert_eq!(extract_json(input), r#"{"need_summary": false}"#);
    }

    #[test]
    fn test_extract_json_no_object() {
        assert_eq!(extract_json("  plain text  "), "plain text");
    }
}
