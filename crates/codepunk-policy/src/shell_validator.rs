//! Shell Validator (C16).
//!
//! Tokenizes a chained command line respecting single/double quotes, splits
//! on unquoted `&&`, `||`, `;`, then per segment extracts the command root
//! and rejects unquoted command substitution. Generalized from
//! `contains_forbidden_shell_tokens` (which rejects whole categories of
//! shell metacharacters outright) into a narrower contract: only command
//! substitution is forbidden, chaining itself is allowed so each chained
//! segment can be checked against an allow/block list.

use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellViolation {
    /// An unquoted `$( )`, backtick, `<( )`, or `>( )` substitution.
    CommandSubstitution { segment: String },
    /// The segment's command root is in the configured blocklist.
    Blocked { segment: String, root: String },
    /// An allowlist is configured and the segment's root is not in it.
    NotAllowed { segment: String, root: String },
}

#[derive(Debug, Clone, Default)]
pub struct ShellValidatorConfig {
    /// When `Some`, only these command roots (basenames) are permitted.
    pub allowlist: Option<Vec<String>>,
    pub blocklist: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Splits `cmd` into segments on unquoted `;`, `&&`, `||`.
pub fn split_command_segments(cmd: &str) -> Vec<String> {
    let chars: Vec<char> = cmd.chars().collect();
    let mut quote = Quote::None;
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if quote == Quote::Single {
            if c == '\'' {
                quote = Quote::None;
            }
            i += 1;
            continue;
        }
        if c == '\\' {
            i += 2;
            continue;
        }
        if quote == Quote::None && c == '\'' {
            quote = Quote::Single;
            i += 1;
            continue;
        }
        if c == '"' {
            quote = if quote == Quote::Double {
                Quote::None
            } else {
                Quote::Double
            };
            i += 1;
            continue;
        }
        if quote == Quote::None {
            if c == ';' {
                segments.push(chars[start..i].iter().collect::<String>());
                i += 1;
                start = i;
                continue;
            }
            if (c == '&' && chars.get(i + 1) == Some(&'&'))
                || (c == '|' && chars.get(i + 1) == Some(&'|'))
            {
                segments.push(chars[start..i].iter().collect::<String>());
                i += 2;
                start = i;
                continue;
            }
        }
        i += 1;
    }
    segments.push(chars[start..].iter().collect::<String>());
    segments
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `true` if `segment` contains an unquoted command substitution. Single
/// quotes neutralize everything inside them; a backslash escapes the next
/// character even outside quotes. `$( )` is still rejected inside double
/// quotes (the shell evaluates it there too); `<( )`/`>( )` process
/// substitution is only meaningful unquoted.
fn contains_command_substitution(segment: &str) -> bool {
    let chars: Vec<char> = segment.chars().collect();
    let mut quote = Quote::None;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if quote == Quote::Single {
            if c == '\'' {
                quote = Quote::None;
            }
            i += 1;
            continue;
        }
        if c == '\\' {
            i += 2;
            continue;
        }
        if quote == Quote::None && c == '\'' {
            quote = Quote::Single;
            i += 1;
            continue;
        }
        if c == '"' {
            quote = if quote == Quote::Double {
                Quote::None
            } else {
                Quote::Double
            };
            i += 1;
            continue;
        }
        if c == '`' {
            return true;
        }
        if c == '$' && chars.get(i + 1) == Some(&'(') {
            return true;
        }
        if quote == Quote::None {
            if c == '<' && chars.get(i + 1) == Some(&'(') {
                return true;
            }
            if c == '>' && chars.get(i + 1) == Some(&'(') {
                return true;
            }
        }
        i += 1;
    }
    false
}

/// The basename of the segment's first word, quote-aware.
pub fn command_root(segment: &str) -> Option<String> {
    let words = shell_words::split(segment).ok()?;
    let first = words.into_iter().next()?;
    Path::new(&first)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// Validates a full (possibly chained) command line against `cfg`. Returns
/// every violation found across all segments, in segment order.
pub fn validate_command(cmd: &str, cfg: &ShellValidatorConfig) -> Vec<ShellViolation> {
    let mut violations = Vec::new();
    for segment in split_command_segments(cmd) {
        if contains_command_substitution(&segment) {
            violations.push(ShellViolation::CommandSubstitution {
                segment: segment.clone(),
            });
            continue;
        }
        let Some(root) = command_root(&segment) else {
            continue;
        };
        if cfg.blocklist.iter().any(|b| b == &root) {
            violations.push(ShellViolation::Blocked {
                segment: segment.clone(),
                root,
            });
            continue;
        }
        if let Some(allowlist) = &cfg.allowlist
            && !allowlist.iter().any(|a| a == &root)
        {
            violations.push(ShellViolation::NotAllowed { segment, root });
        }
    }
    violations
}
