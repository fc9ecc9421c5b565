//! Prompt catalogue for the memory oracle.
//!
//! Each prompt kind has a built-in template, a default LLM alias and default
//! sampling options. `OracleConfig` lets a deployment override any of those
//! per kind without touching code.

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};

use alice_core::{LLMConfig, LLMError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Does the unsummarised buffer need consolidating, and merge or new?
    JudgeDialogueSummary,
    /// How many leading buffer turns still continue the current summary?
    SplitBufferByTopic,
    /// Produce the full summary text and pick new vs update.
    SummarizeDialogue,
    /// Classify the tone and direction of the recent conversation.
    JudgeChatState,
}

impl PromptKind {
    pub const ALL: [PromptKind; 4] = [
        PromptKind::JudgeDialogueSummary,
        PromptKind::SplitBufferByTopic,
        PromptKind::SummarizeDialogue,
        PromptKind::JudgeChatState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JudgeDialogueSummary => "judge_dialogue_summary",
            Self::SplitBufferByTopic => "split_buffer_by_topic",
            Self::SummarizeDialogue => "summarize_dialogue",
            Self::JudgeChatState => "judge_chat_state",
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::JudgeDialogueSummary | Self::SummarizeDialogue => {
                &["summary_text", "dialogues_text"]
            }
            Self::SplitBufferByTopic => &["current_summary", "dialogue_turns"],
            Self::JudgeChatState => &["dialogue_turns"],
        }
    }

    pub fn default_alias(&self) -> &'static str {
        match self {
            Self::JudgeDialogueSummary | Self::SplitBufferByTopic | Self::JudgeChatState => {
                "router"
            }
            Self::SummarizeDialogue => "default",
        }
    }

    pub fn default_options(&self) -> LLMConfig {
        match self {
            Self::JudgeDialogueSummary | Self::SplitBufferByTopic | Self::JudgeChatState => {
                LLMConfig::new().with_temperature(0.0).with_top_p(1.0)
            }
            Self::SummarizeDialogue => LLMConfig::new()
                .with_temperature(0.25)
                .with_top_p(0.9)
                .with_repeat_penalty(1.05)
                .with_max_tokens(256),
        }
    }

    pub fn default_template(&self) -> &'static str {
        match self {
            Self::JudgeDialogueSummary => JUDGE_DIALOGUE_SUMMARY,
            Self::SplitBufferByTopic => SPLIT_BUFFER_BY_TOPIC,
            Self::SummarizeDialogue => SUMMARIZE_DIALOGUE,
            Self::JudgeChatState => JUDGE_CHAT_STATE,
        }
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-specified oracle request. Each variant carries exactly the fields
/// its template needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OraclePrompt {
    JudgeDialogueSummary {
        summary_text: String,
        dialogues_text: String,
    },
    SplitBufferByTopic {
        current_summary: String,
        dialogue_turns: String,
    },
    SummarizeDialogue {
        summary_text: String,
        dialogues_text: String,
    },
    JudgeChatState {
        dialogue_turns: String,
    },
}

impl OraclePrompt {
    pub fn kind(&self) -> PromptKind {
        match self {
            Self::JudgeDialogueSummary { .. } => PromptKind::JudgeDialogueSummary,
            Self::SplitBufferByTopic { .. } => PromptKind::SplitBufferByTopic,
            Self::SummarizeDialogue { .. } => PromptKind::SummarizeDialogue,
            Self::JudgeChatState { .. } => PromptKind::JudgeChatState,
        }
    }

    pub fn fields(&self) -> BTreeMap<&'static str, &str> {
        let mut fields = BTreeMap::new();
        match self {
            Self::JudgeDialogueSummary {
                summary_text,
                dialogues_text,
            }
            | Self::SummarizeDialogue {
                summary_text,
                dialogues_text,
            } => {
                fields.insert("summary_text", summary_text.as_str());
                fields.insert("dialogues_text", dialogues_text.as_str());
            }
            Self::SplitBufferByTopic {
                current_summary,
                dialogue_turns,
            } => {
                fields.insert("current_summary", current_summary.as_str());
                fields.insert("dialogue_turns", dialogue_turns.as_str());
            }
            Self::JudgeChatState { dialogue_turns } => {
                fields.insert("dialogue_turns", dialogue_turns.as_str());
            }
        }
        fields
    }
}

/// Per-kind overrides. Unset fields fall back to the kind's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<LLMConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl PromptSettings {
    pub fn with_llm(mut self, alias: impl Into<String>) -> Self {
        self.llm = Some(alias.into());
        self
    }

    pub fn with_options(mut self, options: LLMConfig) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub judge_dialogue_summary: PromptSettings,
    #[serde(default)]
    pub split_buffer_by_topic: PromptSettings,
    #[serde(default)]
    pub summarize_dialogue: PromptSettings,
    #[serde(default)]
    pub judge_chat_state: PromptSettings,
}

impl OracleConfig {
    pub fn settings(&self, kind: PromptKind) -> &PromptSettings {
        match kind {
            PromptKind::JudgeDialogueSummary => &self.judge_dialogue_summary,
            PromptKind::SplitBufferByTopic => &self.split_buffer_by_topic,
            PromptKind::SummarizeDialogue => &self.summarize_dialogue,
            PromptKind::JudgeChatState => &self.judge_chat_state,
        }
    }

    pub fn settings_mut(&mut self, kind: PromptKind) -> &mut PromptSettings {
        match kind {
            PromptKind::JudgeDialogueSummary => &mut self.judge_dialogue_summary,
            PromptKind::SplitBufferByTopic => &mut self.split_buffer_by_topic,
            PromptKind::SummarizeDialogue => &mut self.summarize_dialogue,
            PromptKind::JudgeChatState => &mut self.judge_chat_state,
        }
    }

    pub fn alias_for(&self, kind: PromptKind) -> &str {
        self.settings(kind)
            .llm
            .as_deref()
            .unwrap_or_else(|| kind.default_alias())
    }

    pub fn options_for(&self, kind: PromptKind) -> LLMConfig {
        let defaults = kind.default_options();
        match &self.settings(kind).options {
            Some(overrides) => defaults.merge(overrides),
            None => defaults,
        }
    }

    pub fn template_for(&self, kind: PromptKind) -> &str {
        self.settings(kind)
            .template
            .as_deref()
            .unwrap_or_else(|| kind.default_template())
    }

    /// Aliases named explicitly in this config.
    pub fn configured_aliases(&self) -> Vec<&str> {
        PromptKind::ALL
            .iter()
            .filter_map(|kind| self.settings(*kind).llm.as_deref())
            .collect()
    }

    /// Compile every template and render it once with empty values, so a
    /// typo in an override surfaces at startup rather than mid-conversation.
    pub fn validate(&self) -> Result<(), LLMError> {
        for kind in PromptKind::ALL {
            let fields: BTreeMap<&str, &str> =
                kind.required_fields().iter().map(|f| (*f, "")).collect();
            render_template(kind, self.template_for(kind), &fields)?;
        }
        Ok(())
    }
}

pub(crate) fn render_template(
    kind: PromptKind,
    template: &str,
    fields: &BTreeMap<&str, &str>,
) -> Result<String, LLMError> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
    env.set_undefined_behavior(UndefinedBehavior::Strict);

    let tmpl = env
        .template_from_str(template)
        .map_err(|e| LLMError::Config(format!("template {} does not parse: {}", kind, e)))?;

    tmpl.render(fields)
        .map_err(|e| LLMError::Config(format!("template {} failed to render: {}", kind, e)))
}

const JUDGE_DIALOGUE_SUMMARY: &str = r#"You are a dialogue memory referee.

Your job is not to continue the conversation. Decide whether the most recent,
not yet summarised dialogue should be consolidated into long-term memory, and how.

Rules:
- Do not invent or embellish.
- Do not explain your reasoning.
- Reply with JSON only.

You receive:
1. The existing summaries (possibly empty).
2. The recent dialogue that has not been summarised yet.

Decide:
- whether a summary is needed;
- if so, whether it extends an existing summary ("merge") or starts a new one ("new");
- if not, answer "none".

Consider: a new long-running topic; stable preferences, relationship changes,
goals or commitments; versus small talk, jokes or one-off questions.

Reply in exactly this format:
{"need_summary": true | false, "summary_action": "merge" | "new" | "none"}

[Existing summaries]
{{ summary_text }}

[Recent dialogue]
{{ dialogues_text }}
"#;

const SPLIT_BUFFER_BY_TOPIC: &str = r#"You are a dialogue coherence analyser.

Given the current summary and a list of new dialogue turns, count how many turns,
starting from turn 0, still continue the topic of the current summary.
Only count the contiguous prefix: stop as soon as a turn clearly moves to a new topic.

[Current summary]
{{ current_summary }}

[New dialogue turns] (numbered from 0)
{{ dialogue_turns }}

Rules:
- continuation_turns is a COUNT of turns, not an index.
- If turn 0 already leaves the summary's topic, continuation_turns = 0.
- A new topic, goal or question that does not depend on the summary breaks the run.
- If a turn mixes old and new topics, it breaks the run when the new topic dominates.

Reply with a single JSON object and nothing else:
{"continuation_turns": x}
where x is an integer with 0 <= x <= number of new turns.
"#;

const SUMMARIZE_DIALOGUE: &str = r#"You are a staged dialogue summariser.

Compress the unsummarised dialogue into one objective summary worth keeping long term,
and decide whether it updates an existing summary ("update") or creates a new one ("new").

Rules:
- Do not invent, over-infer or add information that did not appear.
- Do not quote the dialogue verbatim.
- Third person, neutral, concise.
- Reply with JSON only.

Existing summaries are listed one per line as:
- [summary_id]123[summary_content]...

Choose "update" when the dialogue continues, extends or corrects the topic of one
existing summary; you must then return that summary's id unchanged.
Choose "new" when the dialogue opens a new topic, matches no existing summary, or
there are no summaries; summary_id must then be null.

Reply with exactly one JSON object:
{"action": "update" | "new", "summary_id": <integer or null>, "summary_content": "<the complete summary>"}

summary_content must be the complete summary (not a patch), one to six sentences,
focused on facts: stable topics, explicit preferences, goals and open tasks,
relationship changes, and emotional tendencies only when they persist across turns.

[Existing summaries]
{{ summary_text }}

[Unsummarised dialogue]
{{ dialogues_text }}
"#;

const JUDGE_CHAT_STATE: &str = r#"You are a conversation state analyser.

Read the recent dialogue and describe the current state of the interaction.

[Recent dialogue]
{{ dialogue_turns }}

Pick one value per field:
- interaction: "small talk" | "question answering" | "role play" | "information" | "task help" | "other"
- user_attitude: "positive" | "neutral" | "negative"
- emotional_state: "calm" | "excited" | "frustrated" | "cheerful" | "tense" | "other"
- leading_approach: "user-led" | "assistant-led" | "balanced"

Reply with a single JSON object and nothing else:
{"interaction": "...", "user_attitude": "...", "emotional_state": "...", "leading_approach": "..."}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routing() {
        let config = OracleConfig::default();
        assert_eq!(config.alias_for(PromptKind::JudgeDialogueSummary), "router");
        assert_eq!(config.alias_for(PromptKind::SplitBufferByTopic), "router");
        assert_eq!(config.alias_for(PromptKind::SummarizeDialogue), "default");
        assert_eq!(config.alias_for(PromptKind::JudgeChatState), "router");
        assert_eq!(
            config.options_for(PromptKind::JudgeChatState),
            config.options_for(PromptKind::JudgeDialogueSummary)
        );

        let judge = config.options_for(PromptKind::JudgeDialogueSummary);
        assert_eq!(judge.temperature, Some(0.0));
        assert_eq!(judge.top_p, Some(1.0));

        let summarize = config.options_for(PromptKind::SummarizeDialogue);
        assert_eq!(summarize.temperature, Some(0.25));
        assert_eq!(summarize.top_p, Some(0.9));
        assert_eq!(summarize.max_tokens, Some(256));
    }

    #[test]
    fn test_overrides_merge_with_defaults() {
        let yaml = r#"
summarize_dialogue:
  llm: big
  options:
    max_tokens: 512
"#;
        let config: OracleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.alias_for(PromptKind::SummarizeDialogue), "big");
        let options = config.options_for(PromptKind::SummarizeDialogue);
        assert_eq!(options.max_tokens, Some(512));
        assert_eq!(options.temperature, Some(0.25));
        assert_eq!(config.configured_aliases(), vec!["big"]);
    }

    #[test]
    fn test_prompt_fields_match_kind() {
        let prompt = OraclePrompt::SplitBufferByTopic {
            current_summary: "talked about cats".into(),
            dialogue_turns: "[0] role:user content:more cats".into(),
        };
        assert_eq!(prompt.kind(), PromptKind::SplitBufferByTopic);
        let fields = prompt.fields();
        let names: Vec<&str> = fields.keys().copied().collect();
        assert_eq!(names, PromptKind::SplitBufferByTopic.required_fields());
    }

    #[test]
    fn test_chat_state_prompt_renders_turns() {
        let prompt = OraclePrompt::JudgeChatState {
            dialogue_turns: "[7] role:user content:ugh, my train is late again".into(),
        };
        assert_eq!(prompt.kind(), PromptKind::JudgeChatState);
        let rendered =
            render_template(prompt.kind(), prompt.kind().default_template(), &prompt.fields())
                .unwrap();
        assert!(rendered.contains("[7] role:user content:ugh, my train is late again"));
        assert!(rendered.contains(r#""leading_approach": "...""#));
    }

    #[test]
    fn test_default_templates_render() {
        let prompt = OraclePrompt::JudgeDialogueSummary {
            summary_text: "- [summary_id]1[summary_content]likes tea".into(),
            dialogues_text: "[0] role:user content:hello".into(),
        };
        let rendered = render_template(
            prompt.kind(),
            prompt.kind().default_template(),
            &prompt.fields(),
        )
        .unwrap();
        assert!(rendered.contains("likes tea"));
        assert!(rendered.contains(r#"{"need_summary": true | false"#));
        assert!(OracleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unknown_field_in_override_is_rejected() {
        let mut config = OracleConfig::default();
        *config.settings_mut(PromptKind::SplitBufferByTopic) =
            PromptSettings::default().with_template("{{ current_summary }} {{ dialogues_text }}");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LLMError::Config(_)));
    }
}
