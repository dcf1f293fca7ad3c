use anyhow::Result;
use codepunk_errors::{ErrorCode, ErrorEnvelope};
use serde::Serialize;

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Prints the `{schema, error:{code, message}}` envelope to stdout in
/// quiet/JSON mode, or a styled line to stderr otherwise.
pub(crate) fn print_error(schema: &str, code: ErrorCode, message: &str, json_mode: bool) -> Result<()> {
    if json_mode {
        print_json(&ErrorEnvelope::new(schema, code, message))?;
    } else {
        eprintln!("error: {code}: {message}");
    }
    Ok(())
}
