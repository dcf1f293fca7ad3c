//! Session Summarizer (C13).
//!
//! Deterministic, network-free extraction of a goal and candidate files out
//! of a prior chat transcript, so a plan can be seeded with `plan create
//! --from-session` without another model round trip.

use codepunk_core::{PlanSummary, TokenUsageApprox};
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
pub struct SessionMessage {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SummarizeOptions {
    pub max_messages: usize,
    pub include_tool_messages: bool,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            max_messages: 20,
            include_tool_messages: false,
        }
    }
}

static GOAL_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(add|update|fix|refactor|remove|implement)\b").unwrap());

static FILE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[A-Za-z0-9_./\\-]+\.(?:rs|toml|py|js|ts|tsx|jsx|go|java|c|cc|cpp|h|hpp|html|css|md|json|yml|yaml)\b",
    )
    .unwrap()
});

/// Summarizes `messages` into a goal and candidate file list. Returns `None`
/// when there are fewer than 2 user messages in the whole transcript (not
/// just the sampled window) — too little signal to seed a plan from.
pub fn summarize(messages: &[SessionMessage], opts: SummarizeOptions) -> Option<PlanSummary> {
    let total_user_messages = messages.iter().filter(|m| m.role == Role::User).count();
    if total_user_messages < 2 {
        return None;
    }

    let relevant: Vec<&SessionMessage> = messages
        .iter()
        .filter(|m| m.role == Role::User || (opts.include_tool_messages && m.role == Role::Tool))
        .collect();
    let total_messages = relevant.len();
    let sampled: Vec<&&SessionMessage> = relevant
        .iter()
        .rev()
        .take(opts.max_messages)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let goal = infer_goal(&sampled);
    let candidate_files = extract_candidate_files(&sampled);
    let truncated = total_messages > opts.max_messages;

    let sample_chars: u64 = goal.chars().count() as u64
        + candidate_files
            .iter()
            .map(|f| f.chars().count() as u64 + 1)
            .sum::<u64>();

    Some(PlanSummary {
        source: "session-transcript".to_string(),
        goal,
        candidate_files,
        rationale: None,
        used_messages: sampled.len() as u64,
        total_messages: total_messages as u64,
        truncated,
        token_usage: TokenUsageApprox {
            sample_chars,
            approx_tokens: sample_chars.div_ceil(4),
        },
    })
}

/// First user message's leading sentence, trimmed; prefers a sentence that
/// contains one of the recognized action verbs.
fn infer_goal(sampled: &[&&SessionMessage]) -> String {
    let user_messages: Vec<&str> = sampled
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.text.as_str())
        .collect();

    let Some(first) = user_messages.first() else {
        return String::new();
    };

    let candidate_sentence = |text: &str| -> String {
        text.split(['.', '\n'])
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("")
            .to_string()
    };

    if let Some(verb_sentence) = user_messages.iter().find_map(|text| {
        text.split(['.', '\n'])
            .map(str::trim)
            .find(|s| !s.is_empty() && GOAL_VERB.is_match(s))
    }) {
        return verb_sentence.to_string();
    }

    candidate_sentence(first)
}

/// Path-like tokens across every sampled message, deduplicated
/// case-insensitively while preserving first-seen order.
fn extract_candidate_files(sampled: &[&&SessionMessage]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut files = Vec::new();
    for message in sampled {
        for m in FILE_TOKEN.find_iter(&message.text) {
            let token = m.as_str().to_string();
            let key = token.to_ascii_lowercase();
            if seen.insert(key) {
                files.push(token);
            }
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> SessionMessage {
        SessionMessage {
            role: Role::User,
            text: text.to_string(),
        }
    }

    fn assistant(text: &str) -> SessionMessage {
        SessionMessage {
            role: Role::Assistant,
            text: text.to_string(),
        }
    }

    #[test]
    fn returns_none_with_fewer_than_two_user_messages() {
        let messages = vec![user("fix the login bug")];
        assert!(summarize(&messages, SummarizeOptions::default()).is_none());
    }

    #[test]
    fn infers_goal_biased_toward_action_verbs() {
        let messages = vec![
            user("hey there, I have a question"),
            assistant("sure, go ahead"),
            user("please add a dark mode toggle to settings.rs"),
        ];
        let summary = summarize(&messages, SummarizeOptions::default()).unwrap();
        assert!(summary.goal.to_ascii_lowercase().contains("add"));
    }

    #[test]
    fn extracts_deduplicated_candidate_files_preserving_order() {
        let messages = vec![
            user("update src/main.rs and tests/lib_test.rs"),
            user("also touch src/MAIN.rs again please"),
        ];
        let summary = summarize(&messages, SummarizeOptions::default()).unwrap();
        assert_eq!(summary.candidate_files.len(), 2);
        assert_eq!(summary.candidate_files[0], "src/main.rs");
        assert_eq!(summary.candidate_files[1], "tests/lib_test.rs");
    }

    #[test]
    fn truncated_flag_reflects_total_vs_sampled() {
        let opts = SummarizeOptions {
            max_messages: 2,
            include_tool_messages: false,
        };
        let messages = vec![
            user("first message mentions a.md"),
            user("second message mentions b.md"),
            user("third message mentions c.md"),
        ];
        let summary = summarize(&messages, opts).unwrap();
        assert!(summary.truncated);
        assert_eq!(summary.used_messages, 2);
        assert_eq!(summary.total_messages, 3);
    }

    #[test]
    fn tool_messages_are_excluded_by_default() {
        let messages = vec![
            user("first turn"),
            SessionMessage {
                role: Role::Tool,
                text: "tool output mentions z.md".to_string(),
            },
            user("second turn"),
        ];
        let summary = summarize(&messages, SummarizeOptions::default()).unwrap();
        assert!(summary.candidate_files.is_empty());
    }
}
