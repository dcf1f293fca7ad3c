//! Plan Safety Gate (C6).
//!
//! Runs between AI output parsing and store persistence. Each rule either
//! attaches a diagnostic to the offending entry or aborts the whole
//! generation — never both for the same rule.

use crate::errors::PlanError;
use codepunk_core::{Diagnostic, PlanFileChange, SafetyGateConfig};
use codepunk_policy::check_path_safety;

/// Runs every rule in order over `files`, mutating entries in place and
/// returning `TooManyFiles` before touching anything else if the count rule
/// fails.
pub fn run_safety_gate(
    files: &mut Vec<PlanFileChange>,
    cfg: &SafetyGateConfig,
) -> Result<(), PlanError> {
    if files.len() as u64 > cfg.max_files {
        return Err(PlanError::TooManyFiles {
            count: files.len() as u64,
            max: cfg.max_files,
        });
    }

    for file in files.iter_mut() {
        apply_path_safety(file, cfg);
        redact_secrets(file, cfg);
    }

    apply_truncation(files, cfg);

    Ok(())
}

fn apply_path_safety(file: &mut PlanFileChange, cfg: &SafetyGateConfig) {
    if check_path_safety(&file.path, cfg.max_path_length as usize).is_err() {
        file.diagnostics.push(Diagnostic::UnsafePath);
    }
}

fn redact_secrets(file: &mut PlanFileChange, cfg: &SafetyGateConfig) {
    let Some(rationale) = file.rationale.as_mut() else {
        return;
    };
    let mut redacted = false;
    for pattern in &cfg.secret_patterns {
        if rationale.to_ascii_lowercase().contains(&pattern.to_ascii_lowercase()) {
            *rationale = redact_case_insensitive(rationale, pattern);
            redacted = true;
        }
    }
    if redacted {
        file.diagnostics.push(Diagnostic::SecretRedacted);
    }
}

fn redact_case_insensitive(text: &str, pattern: &str) -> String {
    if pattern.is_empty() {
        return text.to_string();
    }
    let lower_text = text.to_ascii_lowercase();
    let lower_pattern = pattern.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut rest_lower = lower_text.as_str();
    while let Some(idx) = rest_lower.find(&lower_pattern) {
        out.push_str(&rest[..idx]);
        out.push_str("<REDACTED>");
        rest = &rest[idx + pattern.len()..];
        rest_lower = &rest_lower[idx + pattern.len()..];
    }
    out.push_str(rest);
    out
}

/// Per-file then aggregate truncation: each retained rationale is capped at
/// `maxPerFileBytes`, and a running total caps the whole plan at
/// `maxTotalBytes`, dropping every entry after the one that would cross it.
fn apply_truncation(files: &mut Vec<PlanFileChange>, cfg: &SafetyGateConfig) {
    let mut total: u64 = 0;
    let mut cutoff: Option<usize> = None;

    for (idx, file) in files.iter_mut().enumerate() {
        let Some(rationale) = file.rationale.as_mut() else {
            continue;
        };
        if rationale.len() as u64 > cfg.max_per_file_bytes {
            *rationale = truncate_on_utf8_boundary(rationale, cfg.max_per_file_bytes as usize);
            rationale.push_str("...");
            file.diagnostics.push(Diagnostic::TruncatedContent);
        }

        let retained = (rationale.len() as u64).min(cfg.max_per_file_bytes);
        if total + retained > cfg.max_total_bytes {
            file.diagnostics.push(Diagnostic::TruncatedAggregate);
            cutoff = Some(idx);
            break;
        }
        total += retained;
    }

    if let Some(idx) = cutoff {
        files.truncate(idx + 1);
    }
}

/// Truncates `text` to at most `max_bytes` UTF-8 bytes, walking back past
/// continuation bytes (`10xxxxxx`) so the cut never splits a code point.
fn truncate_on_utf8_boundary(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && (text.as_bytes()[end] & 0b1100_0000) == 0b1000_0000 {
        end -= 1;
    }
    text[..end].to_string()
}
