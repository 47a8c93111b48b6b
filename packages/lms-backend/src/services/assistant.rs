//! Prompt construction, response parsing and the gate in front of [`LLMProvider`].
//!
//! Every AI feature goes through [`Assistant`]: it honours the runtime
//! `llm_enabled` / `llm_mock` switches before any network call is made, so
//! callers only ever see a reply or a typed [`LLMError`].

use serde::Serialize;

use crate::models::MessageType;
use crate::services::llm_provider::{LLMError, LLMProvider};
use crate::state::RuntimeConfig;

pub const CONTEXT_WINDOW: usize = 5;
pub const TITLE_MAX_CHARS: usize = 50;
pub const SUMMARY_MAX_LENGTH: usize = 500;
pub const STORED_PROMPT_MAX_CHARS: usize = 500;
pub const DEFAULT_LEVEL: &str = "intermediate";
pub const DEFAULT_QUESTION_COUNT: u32 = 5;
pub const MAX_QUESTION_COUNT: u32 = 20;

const SYSTEM_PROMPT: &str = "You are a helpful educational AI assistant for a learning management system.";
const ASSISTANT_TONE: &str =
    "Respond as a helpful educational AI assistant. Be clear, concise, and supportive.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub message_type: MessageType,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFeedback {
    pub strengths: String,
    pub improvements: String,
    pub suggestions: String,
}

impl ParsedFeedback {
    pub fn combined_text(&self) -> String {
        format!(
            "Strengths:\n{}\n\nAreas for Improvement:\n{}\n\nSuggestions:\n{}",
            self.strengths, self.improvements, self.suggestions
        )
    }
}

pub struct Assistant<'a> {
    llm: &'a LLMProvider,
    runtime: &'a RuntimeConfig,
}

impl<'a> Assistant<'a> {
    pub fn new(llm: &'a LLMProvider, runtime: &'a RuntimeConfig) -> Self {
        Self { llm, runtime }
    }

    pub async fn summarize(&self, content: &str, max_length: usize) -> Result<String, LLMError> {
        self.complete(&summary_prompt(content, max_length)).await
    }

    pub async fn explain(&self, topic: &str, level: &str) -> Result<String, LLMError> {
        self.complete(&explanation_prompt(topic, level)).await
    }

    pub async fn practice_questions(&self, topic: &str, count: u32) -> Result<String, LLMError> {
        self.complete(&practice_prompt(topic, count)).await
    }

    pub async fn feedback(&self, question: &str, answer: &str) -> Result<ParsedFeedback, LLMError> {
        let text = self.complete(&feedback_prompt(question, answer)).await?;
        Ok(parse_feedback(&text))
    }

    pub async fn chat(&self, message: &str, history: &[HistoryEntry]) -> Result<String, LLMError> {
        self.complete(&chat_prompt(message, history)).await
    }

    async fn complete(&self, prompt: &str) -> Result<String, LLMError> {
        if !self.runtime.llm_enabled {
            return Err(LLMError::Disabled);
        }
        if self.runtime.llm_mock {
            return Ok(mock_reply(prompt));
        }
        if !self.llm.is_available() {
            return Err(LLMError::NotConfigured("LLM_API_KEY"));
        }
        self.llm.complete_with_system(SYSTEM_PROMPT, prompt).await
    }
}

pub fn summary_prompt(content: &str, max_length: usize) -> String {
    format!(
        "Please provide a concise summary of the following educational content.\n\
         Keep it under {max_length} characters and focus on key concepts.\n\n\
         Content: {content}"
    )
}

pub fn explanation_prompt(topic: &str, level: &str) -> String {
    format!(
        "Explain the following topic at a {level} level.\n\
         Make it clear, engaging, and use examples where appropriate.\n\n\
         Topic: {topic}"
    )
}

pub fn practice_prompt(topic: &str, count: u32) -> String {
    format!(
        "Create {count} practice questions about {topic}.\n\
         Include a mix of multiple-choice and short-answer questions.\n\
         Format them clearly with question numbers."
    )
}

pub fn feedback_prompt(question: &str, answer: &str) -> String {
    format!(
        "Question: {question}\n\n\
         Student Answer: {answer}\n\n\
         Please provide constructive feedback with:\n\
         1. Strengths in the answer\n\
         2. Areas for improvement\n\
         3. Specific suggestions for enhancement\n\n\
         Format your response as:\n\
         STRENGTHS: [list strengths]\n\
         IMPROVEMENTS: [list improvements]\n\
         SUGGESTIONS: [provide suggestions]"
    )
}

pub fn chat_prompt(message: &str, history: &[HistoryEntry]) -> String {
    let window = context_window(history);
    if window.is_empty() {
        return format!("User asks: {message}\n\n{ASSISTANT_TONE}");
    }

    let conversation = window
        .iter()
        .map(|entry| {
            let speaker = match entry.message_type {
                MessageType::User => "User",
                MessageType::Ai => "AI",
            };
            format!("{speaker}: {}", entry.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("Previous conversation:\n{conversation}\n\nUser: {message}\n\n{ASSISTANT_TONE}")
}

/// The last [`CONTEXT_WINDOW`] entries, oldest first.
pub fn context_window(history: &[HistoryEntry]) -> &[HistoryEntry] {
    let start = history.len().saturating_sub(CONTEXT_WINDOW);
    &history[start..]
}

pub fn parse_feedback(text: &str) -> ParsedFeedback {
    if !text.contains("STRENGTHS:") {
        return ParsedFeedback {
            strengths: text.to_string(),
            ..ParsedFeedback::default()
        };
    }

    let (head, rest) = match text.split_once("IMPROVEMENTS:") {
        Some((head, rest)) => (head, Some(rest)),
        None => (text, None),
    };

    let mut feedback = ParsedFeedback {
        strengths: head.replace("STRENGTHS:", "").trim().to_string(),
        ..ParsedFeedback::default()
    };

    if let Some(rest) = rest {
        match rest.split_once("SUGGESTIONS:") {
            Some((improvements, suggestions)) => {
                feedback.improvements = improvements.trim().to_string();
                feedback.suggestions = suggestions.trim().to_string();
            }
            None => feedback.improvements = rest.trim().to_string(),
        }
    }

    feedback
}

pub fn conversation_title(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        format!("{}...", truncate_chars(trimmed, TITLE_MAX_CHARS))
    } else {
        trimmed.to_string()
    }
}

pub fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

pub fn normalize_level(level: Option<&str>) -> Option<&'static str> {
    match level.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Some(DEFAULT_LEVEL),
        Some("beginner") => Some("beginner"),
        Some("intermediate") => Some("intermediate"),
        Some("advanced") => Some("advanced"),
        Some(_) => None,
    }
}

pub fn clamp_question_count(count: Option<i64>) -> u32 {
    count
        .unwrap_or(DEFAULT_QUESTION_COUNT as i64)
        .clamp(1, MAX_QUESTION_COUNT as i64) as u32
}

pub fn summary_stored_prompt(content: &str) -> String {
    truncate_chars(content, STORED_PROMPT_MAX_CHARS).to_string()
}

pub fn explanation_stored_prompt(topic: &str, level: &str) -> String {
    format!("{topic} (Level: {level})")
}

pub fn practice_stored_prompt(topic: &str, count: u32) -> String {
    format!("{topic} ({count} questions)")
}

fn mock_reply(prompt: &str) -> String {
    if prompt.contains("STRENGTHS: [list strengths]") {
        return "STRENGTHS: The answer addresses the question directly.\n\
                IMPROVEMENTS: Add more supporting detail.\n\
                SUGGESTIONS: Include a worked example."
            .to_string();
    }
    let first_line = prompt.lines().next().unwrap_or_default();
    format!("[mock] {}", truncate_chars(first_line, 80))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message_type: MessageType, content: &str) -> HistoryEntry {
        HistoryEntry {
            message_type,
            content: content.to_string(),
        }
    }

    #[test]
    fn parses_all_three_sections() {
        let parsed = parse_feedback(
            "STRENGTHS: clear intro\nIMPROVEMENTS: cite sources\nSUGGESTIONS: read chapter 3",
        );
        assert_eq!(parsed.strengths, "clear intro");
        assert_eq!(parsed.improvements, "cite sources");
        assert_eq!(parsed.suggestions, "read chapter 3");
    }

    #[test]
    fn missing_marker_puts_everything_in_strengths() {
        let parsed = parse_feedback("Nice work overall.");
        assert_eq!(parsed.strengths, "Nice work overall.");
        assert!(parsed.improvements.is_empty());
        assert!(parsed.suggestions.is_empty());
    }

    #[test]
    fn missing_suggestions_leaves_it_empty() {
        let parsed = parse_feedback("STRENGTHS: a\nIMPROVEMENTS: b");
        assert_eq!(parsed.strengths, "a");
        assert_eq!(parsed.improvements, "b");
        assert_eq!(parsed.suggestions, "");
    }

    #[test]
    fn strengths_only_with_marker() {
        let parsed = parse_feedback("STRENGTHS: solid reasoning");
        assert_eq!(parsed.strengths, "solid reasoning");
        assert!(parsed.improvements.is_empty());
    }

    #[test]
    fn combined_text_layout() {
        let feedback = ParsedFeedback {
            strengths: "s".into(),
            improvements: "i".into(),
            suggestions: "g".into(),
        };
        assert_eq!(
            feedback.combined_text(),
            "Strengths:\ns\n\nAreas for Improvement:\ni\n\nSuggestions:\ng"
        );
    }

    #[test]
    fn chat_prompt_without_history_uses_user_asks() {
        let prompt = chat_prompt("What is a cell?", &[]);
        assert!(prompt.starts_with("User asks: What is a cell?"));
    }

    #[test]
    fn chat_prompt_uses_last_five_messages_in_order() {
        let history: Vec<HistoryEntry> = (0..7)
            .map(|i| {
                let kind = if i % 2 == 0 { MessageType::User } else { MessageType::Ai };
                entry(kind, &format!("m{i}"))
            })
            .collect();

        let prompt = chat_prompt("next", &history);
        assert!(!prompt.contains("m0"));
        assert!(!prompt.contains("m1"));
        let m2 = prompt.find("User: m2").unwrap();
        let m6 = prompt.find("User: m6").unwrap();
        assert!(m2 < m6);
        assert!(prompt.contains("AI: m5"));
        assert!(prompt.contains("User: next"));
    }

    #[test]
    fn title_is_truncated_with_ellipsis() {
        let long = "a".repeat(60);
        let title = conversation_title(&long);
        assert_eq!(title.len(), 53);
        assert!(title.ends_with("..."));
        assert_eq!(conversation_title("short question"), "short question");
        assert_eq!(conversation_title(&"b".repeat(50)), "b".repeat(50));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn level_defaults_and_rejects_unknown() {
        assert_eq!(normalize_level(None), Some("intermediate"));
        assert_eq!(normalize_level(Some("Advanced")), Some("advanced"));
        assert_eq!(normalize_level(Some("expert")), None);
    }

    #[test]
    fn question_count_is_clamped() {
        assert_eq!(clamp_question_count(None), 5);
        assert_eq!(clamp_question_count(Some(0)), 1);
        assert_eq!(clamp_question_count(Some(50)), 20);
    }

    #[test]
    fn stored_prompts() {
        assert_eq!(explanation_stored_prompt("Gravity", "beginner"), "Gravity (Level: beginner)");
        assert_eq!(practice_stored_prompt("Fractions", 3), "Fractions (3 questions)");
        assert_eq!(summary_stored_prompt(&"x".repeat(600)).len(), 500);
    }

    #[test]
    fn mock_feedback_reply_is_parseable() {
        let parsed = parse_feedback(&mock_reply(&feedback_prompt("q", "a")));
        assert!(!parsed.strengths.is_empty());
        assert!(!parsed.improvements.is_empty());
        assert!(!parsed.suggestions.is_empty());
    }

    #[tokio::test]
    async fn disabled_runtime_short_circuits() {
        let llm = LLMProvider::from_env();
        let runtime = RuntimeConfig::new(false, false);
        let result = Assistant::new(&llm, &runtime).chat("hi", &[]).await;
        assert!(matches!(result, Err(LLMError::Disabled)));
    }

    #[tokio::test]
    async fn mock_runtime_answers_without_network() {
        let llm = LLMProvider::from_env();
        let runtime = RuntimeConfig::new(true, true);
        let reply = Assistant::new(&llm, &runtime)
            .explain("Photosynthesis", "beginner")
            .await
            .unwrap();
        assert!(reply.starts_with("[mock]"));
    }
}
