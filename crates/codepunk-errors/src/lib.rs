//! Shared error codes and the CLI-boundary JSON error envelope.
//!
//! Individual crates define their own `thiserror` enums for the errors they
//! can actually produce; this crate only carries the small set of error
//! *codes* that cross the CLI boundary so every crate maps onto the same
//! wire vocabulary instead of inventing its own strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes emitted in `{schema, error:{code, message}}` envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorCode {
    SessionNotFound,
    InsufficientSessionContext,
    ModelUnavailable,
    ModelOutputInvalid,
    TooManyFiles,
    UnsafePath,
    TooLarge,
    InputMissing,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::SessionNotFound => "SessionNotFound",
            ErrorCode::InsufficientSessionContext => "InsufficientSessionContext",
            ErrorCode::ModelUnavailable => "ModelUnavailable",
            ErrorCode::ModelOutputInvalid => "ModelOutputInvalid",
            ErrorCode::TooManyFiles => "TooManyFiles",
            ErrorCode::UnsafePath => "UnsafePath",
            ErrorCode::TooLarge => "TooLarge",
            ErrorCode::InputMissing => "InputMissing",
        };
        f.write_str(s)
    }
}

/// `{code, message}` half of the CLI error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

/// The full `{schema, error:{code, message}}` shape emitted at the CLI
/// boundary in quiet/JSON mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub schema: String,
    pub error: ErrorDetail,
}

impl ErrorEnvelope {
    pub fn new(schema: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            error: ErrorDetail {
                code,
                message: message.into(),
            },
        }
    }
}

/// Truncate raw model output to a 500-char preview for error messages and
/// provider-error reporting.
pub fn preview(raw: &str) -> String {
    const LIMIT: usize = 500;
    if raw.chars().count() <= LIMIT {
        return raw.to_string();
    }
    raw.chars().take(LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_expected_shape() {
        let env = ErrorEnvelope::new(
            "plan.generate.ai.v1",
            ErrorCode::TooManyFiles,
            "File count 2 exceeds limit 1",
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["schema"], "plan.generate.ai.v1");
        assert_eq!(json["error"]["code"], "TooManyFiles");
        assert_eq!(json["error"]["message"], "File count 2 exceeds limit 1");
    }

    #[test]
    fn preview_truncates_at_500_chars() {
        let raw = "x".repeat(600);
        assert_eq!(preview(&raw).chars().count(), 500);
    }

    #[test]
    fn preview_keeps_short_strings_intact() {
        assert_eq!(preview("short"), "short");
    }
}
