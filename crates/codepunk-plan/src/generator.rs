//! AI Plan Generator (C7).
//!
//! A pure consumer of [`ProviderClient`]: the concrete HTTP provider is out
//! of scope here, so this module only owns the trait boundary, the
//! streaming/parsing/heuristic/retry pipeline, and a [`NullProvider`] test
//! double.

use crate::errors::PlanError;
use crate::safety_gate::run_safety_gate;
use codepunk_core::{PlanFileChange, PlanGeneration, PlanRecord, SafetyGateConfig};
use codepunk_errors::preview;
use codepunk_jsonstream::{Extracted, StreamingBuffer};
use codepunk_store::PlanStore;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// One complete response from a provider, streaming or not.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub raw_text: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// The boundary C7 generates against. Concrete HTTP transport is a caller's
/// concern; this crate only needs `send`, `stream`, and
/// `supports_streaming`.
pub trait ProviderClient {
    fn supports_streaming(&self, model: &str) -> bool;

    /// Single non-streaming request/response round trip.
    fn send(&self, model: &str, system_prompt: &str, user_prompt: &str) -> Result<ProviderResponse, PlanError>;

    /// Pre-chunked streaming response body, fed into [`StreamingBuffer`] one
    /// chunk at a time by the caller so it can stop at the first complete
    /// JSON value.
    fn stream(&self, model: &str, system_prompt: &str, user_prompt: &str) -> Result<Vec<Vec<u8>>, PlanError>;
}

/// Test double standing in for a real provider. `chunks` is the streaming
/// response body split however the caller likes; `fallback_text` is what
/// `send` returns for the non-streaming path.
pub struct NullProvider {
    pub model_supports_streaming: bool,
    pub chunks: Vec<Vec<u8>>,
    pub fallback_text: String,
    pub fail: bool,
}

impl NullProvider {
    pub fn with_json(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            model_supports_streaming: false,
            chunks: Vec::new(),
            fallback_text: text,
            fail: false,
        }
    }

    pub fn streaming(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            model_supports_streaming: true,
            chunks,
            fallback_text: String::new(),
            fail: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            model_supports_streaming: false,
            chunks: Vec::new(),
            fallback_text: String::new(),
            fail: true,
        }
    }
}

impl ProviderClient for NullProvider {
    fn supports_streaming(&self, _model: &str) -> bool {
        self.model_supports_streaming
    }

    fn send(&self, _model: &str, _system_prompt: &str, _user_prompt: &str) -> Result<ProviderResponse, PlanError> {
        if self.fail {
            return Err(PlanError::ModelUnavailable("provider unreachable".to_string()));
        }
        Ok(ProviderResponse {
            raw_text: self.fallback_text.clone(),
            ..Default::default()
        })
    }

    fn stream(&self, _model: &str, _system_prompt: &str, _user_prompt: &str) -> Result<Vec<Vec<u8>>, PlanError> {
        if self.fail {
            return Err(PlanError::ModelUnavailable("provider unreachable".to_string()));
        }
        Ok(self.chunks.clone())
    }
}

const SYSTEM_PROMPT: &str = "Respond with a single JSON object: \
{\"files\": [{\"path\": string, \"action\": \"modify\" | \"delete\", \"rationale\": string (optional)}]}. \
No prose, no markdown fences.";

#[derive(Debug, Deserialize)]
struct RawFile {
    path: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    files: Vec<RawFile>,
}

static HEURISTIC_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[A-Za-z0-9_./\\-]+\.(?:html|css|js|md|json|yml|yaml|toml)").unwrap()
});

static WEBSITE_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(website|static site|landing page)\b").unwrap());

/// Generates a plan for `goal` and persists it through `store`.
pub fn generate_and_persist(
    store: &PlanStore,
    provider: &dyn ProviderClient,
    model: &str,
    goal: &str,
    provider_name: &str,
    gate_cfg: &SafetyGateConfig,
    allow_website_scaffold: bool,
) -> Result<PlanRecord, PlanError> {
    let (mut files, mut generation) = generate(provider, model, goal, provider_name, gate_cfg, allow_website_scaffold)?;
    run_safety_gate(&mut files, gate_cfg)?;
    let mut seen_flags = std::collections::HashSet::new();
    generation.safety_flags = files
        .iter()
        .flat_map(|f| f.diagnostics.iter().copied())
        .filter(|d| seen_flags.insert(*d))
        .collect();

    let mut record = PlanRecord::new(PlanStore::generate_id(), goal.to_string());
    record.files = files;
    record.generation = Some(generation);
    store.save(&record).map_err(PlanError::Other)?;
    Ok(record)
}

/// Distinguishes "the model gave us structured JSON, even if `files` is
/// empty" from "we never got a parseable plan out of this attempt" — the two
/// fall back differently.
enum AttemptOutcome {
    Parsed(Vec<PlanFileChange>),
    Unparsed { heuristic: Vec<PlanFileChange>, raw: String },
}

fn generate(
    provider: &dyn ProviderClient,
    model: &str,
    goal: &str,
    provider_name: &str,
    gate_cfg: &SafetyGateConfig,
    allow_website_scaffold: bool,
) -> Result<(Vec<PlanFileChange>, PlanGeneration), PlanError> {
    let max_attempts = gate_cfg.retry_invalid_output + 1;
    let mut last_raw_preview = String::new();

    for attempt in 0..max_attempts {
        let files = match one_attempt(provider, model, goal, gate_cfg, allow_website_scaffold)? {
            AttemptOutcome::Parsed(files) => Some(files),
            AttemptOutcome::Unparsed { heuristic, raw } if !heuristic.is_empty() => {
                let _ = raw;
                Some(heuristic)
            }
            AttemptOutcome::Unparsed { raw, .. } => {
                last_raw_preview = preview(&raw);
                None
            }
        };

        if let Some(mut files) = files {
            if files.is_empty() {
                // Valid JSON, but an empty `files` array: no point retrying
                // a well-formed empty response.
                let mut placeholder = PlanFileChange::new_stage("README.md");
                placeholder.rationale = Some("No files parsed; placeholder".to_string());
                placeholder.generated = true;
                files.push(placeholder);
            }
            let generation = PlanGeneration {
                provider: provider_name.to_string(),
                model: model.to_string(),
                prompt_tokens: None,
                completion_tokens: None,
                total_tokens: None,
                iterations: attempt + 1,
                safety_flags: Vec::new(),
                created_utc: chrono::Utc::now(),
            };
            return Ok((files, generation));
        }

        if attempt + 1 < max_attempts {
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    Err(PlanError::ModelOutputInvalid {
        preview: if last_raw_preview.is_empty() {
            "(empty model output)".to_string()
        } else {
            last_raw_preview
        },
    })
}

/// One send/stream + parse/heuristic round.
fn one_attempt(
    provider: &dyn ProviderClient,
    model: &str,
    goal: &str,
    gate_cfg: &SafetyGateConfig,
    allow_website_scaffold: bool,
) -> Result<AttemptOutcome, PlanError> {
    let user_prompt = format!("Goal: {goal}");
    let raw = if provider.supports_streaming(model) {
        match try_stream(provider, model, &user_prompt, gate_cfg.max_model_output_bytes as usize)? {
            Some(text) => text,
            None => provider.send(model, SYSTEM_PROMPT, &user_prompt)?.raw_text,
        }
    } else {
        provider.send(model, SYSTEM_PROMPT, &user_prompt)?.raw_text
    };

    if let Ok(parsed) = serde_json::from_str::<RawPlan>(&raw) {
        let files = parsed
            .files
            .into_iter()
            .map(|f| {
                let mut change = PlanFileChange::new_stage(f.path);
                change.is_delete = f.action.as_deref() == Some("delete");
                change.rationale = f.rationale;
                change.generated = true;
                change
            })
            .collect();
        return Ok(AttemptOutcome::Parsed(files));
    }

    Ok(AttemptOutcome::Unparsed {
        heuristic: heuristic_extract(goal, &raw, allow_website_scaffold),
        raw,
    })
}

/// Attempts the streaming path: feeds chunks into the streaming JSON
/// assembler, stopping at the first complete value. Returns `None` (not an
/// error) when streaming yields nothing, so the caller falls back to a
/// non-streaming send.
fn try_stream(
    provider: &dyn ProviderClient,
    model: &str,
    user_prompt: &str,
    max_bytes: usize,
) -> Result<Option<String>, PlanError> {
    let chunks = provider.stream(model, SYSTEM_PROMPT, user_prompt)?;
    let mut buffer = StreamingBuffer::new(max_bytes);
    for chunk in chunks {
        buffer.append(&chunk);
        if let Extracted::Value { raw_text, .. } = buffer.try_get_next() {
            return Ok(Some(raw_text));
        }
        if buffer.has_overflowed() {
            return Ok(None);
        }
    }
    Ok(None)
}

/// Heuristic fallback: regex for file-like tokens, deduplicated
/// case-insensitively and capped at 10; if nothing matches and the
/// goal/content hints at a website, emit the two scaffold entries.
fn heuristic_extract(goal: &str, raw: &str, allow_website_scaffold: bool) -> Vec<PlanFileChange> {
    let mut seen = std::collections::HashSet::new();
    let mut files = Vec::new();
    let combined = format!("{goal}\n{raw}");
    for m in HEURISTIC_FILE.find_iter(&combined) {
        if files.len() >= 10 {
            break;
        }
        let token = m.as_str().to_string();
        if seen.insert(token.to_ascii_lowercase()) {
            let mut change = PlanFileChange::new_stage(token);
            change.generated = true;
            files.push(change);
        }
    }

    if files.is_empty() && allow_website_scaffold && website_hinted(&combined) {
        for path in ["public/index.html", "public/styles.css"] {
            let mut change = PlanFileChange::new_stage(path);
            change.generated = true;
            change.rationale = Some("heuristic website scaffold".to_string());
            files.push(change);
        }
    }

    files
}

fn website_hinted(text: &str) -> bool {
    WEBSITE_HINT.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SafetyGateConfig {
        SafetyGateConfig::default()
    }

    #[test]
    fn non_streaming_provider_is_parsed_directly() {
        let provider = NullProvider::with_json(r#"{"files":[{"path":"a.rs","action":"modify","rationale":"fix it"}]}"#);
        let (files, generation) = generate(&provider, "m1", "fix a bug", "test", &cfg(), false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "a.rs");
        assert_eq!(generation.iterations, 1);
    }

    #[test]
    fn streaming_provider_stops_at_first_complete_value() {
        let body = br#"{"files":[{"path":"b.rs","action":"modify"}]}"#;
        let provider = NullProvider::streaming(vec![body[..10].to_vec(), body[10..].to_vec()]);
        let (files, _) = generate(&provider, "m1", "update b", "test", &cfg(), false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "b.rs");
    }

    #[test]
    fn malformed_json_falls_back_to_heuristic_extraction() {
        let provider = NullProvider::with_json("please update src/main.rs and docs/readme.md thanks");
        let (files, _) = generate(&provider, "m1", "update files", "test", &cfg(), false).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"src/main.rs"));
        assert!(paths.contains(&"docs/readme.md"));
    }

    #[test]
    fn website_goal_with_no_heuristic_matches_emits_scaffold_when_allowed() {
        let provider = NullProvider::with_json("not json at all");
        let (files, _) = generate(&provider, "m1", "build me a landing page", "test", &cfg(), true).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"public/index.html"));
        assert!(paths.contains(&"public/styles.css"));
    }

    #[test]
    fn website_scaffold_is_not_emitted_when_disallowed() {
        let provider = NullProvider::with_json("not json at all");
        let err = generate(&provider, "m1", "build me a landing page", "test", &cfg(), false).unwrap_err();
        assert!(matches!(err, PlanError::ModelOutputInvalid { .. }));
    }

    #[test]
    fn valid_json_with_empty_files_array_injects_placeholder_readme() {
        let provider = NullProvider::with_json(r#"{"files":[]}"#);
        let (files, _) = generate(&provider, "m1", "do nothing in particular", "test", &cfg(), false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "README.md");
        assert_eq!(files[0].rationale.as_deref(), Some("No files parsed; placeholder"));
    }

    #[test]
    fn unparseable_output_with_no_heuristic_matches_exhausts_retries_as_invalid() {
        let provider = NullProvider::with_json("not json and no file-like tokens here");
        let err = generate(&provider, "m1", "do something vague", "test", &cfg(), false).unwrap_err();
        assert!(matches!(err, PlanError::ModelOutputInvalid { .. }));
    }

    #[test]
    fn provider_unavailable_propagates_model_unavailable() {
        let provider = NullProvider::unavailable();
        let err = generate(&provider, "m1", "anything", "test", &cfg(), false).unwrap_err();
        assert!(matches!(err, PlanError::ModelUnavailable(_)));
    }

    #[test]
    fn too_many_files_from_generation_is_rejected_by_safety_gate() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        let files_json: String = (0..25)
            .map(|i| format!(r#"{{"path":"f{i}.rs","action":"modify"}}"#))
            .collect::<Vec<_>>()
            .join(",");
        let provider = NullProvider::with_json(format!(r#"{{"files":[{files_json}]}}"#));
        let mut gate_cfg = cfg();
        gate_cfg.max_files = 20;
        let err = generate_and_persist(&store, &provider, "m1", "big change", "test", &gate_cfg, false).unwrap_err();
        assert!(matches!(err, PlanError::TooManyFiles { .. }));
    }

    #[test]
    fn successful_generation_persists_a_plan_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        let provider = NullProvider::with_json(r#"{"files":[{"path":"a.rs","action":"modify"}]}"#);
        let record = generate_and_persist(&store, &provider, "m1", "fix a", "test", &cfg(), false).unwrap();
        assert_eq!(record.files.len(), 1);
        assert!(record.generation.is_some());
        let loaded = store.load(&record.definition.id).unwrap();
        assert_eq!(loaded.files[0].path, "a.rs");
    }
}
