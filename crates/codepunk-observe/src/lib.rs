//! Structured logging.
//!
//! Append-only JSON-lines logger under `<config-root>/codepunk.log`: one
//! line per event, ISO-8601 timestamp + level + JSON payload. `--verbose`
//! additionally echoes to stderr; warnings always echo regardless of
//! verbosity. No external telemetry sink — an optional HTTP telemetry
//! endpoint has no product requirement here and is dropped.

use anyhow::Result;
use chrono::Utc;
use codepunk_core::config_root;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// One structured record recorded through [`Observer::record_event`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "PascalCase")]
pub enum LogEvent {
    PlanCreated {
        plan_id: String,
        goal: String,
    },
    PlanStaged {
        plan_id: String,
        path: String,
    },
    PlanApplied {
        plan_id: String,
        path: String,
        action: String,
    },
    SessionBegin {
        session_id: String,
    },
    SessionCommitToolCall {
        session_id: String,
        tool_name: String,
    },
    SessionAccept {
        session_id: String,
    },
    SessionReject {
        session_id: String,
        reason: String,
    },
    SessionFail {
        session_id: String,
        reason: String,
    },
    SessionReap {
        session_id: String,
    },
}

pub struct Observer {
    log_path: PathBuf,
    verbose: bool,
}

impl Observer {
    /// Opens the log file at `<config-root>/codepunk.log`, creating the
    /// config root if necessary.
    pub fn new() -> Result<Self> {
        let root = config_root()?;
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            log_path: root.join("codepunk.log"),
            verbose: false,
        })
    }

    /// Variant that logs under a caller-chosen directory, for tests and for
    /// the `codepunk-git` worktree lifecycle which wants logs alongside the
    /// workspace rather than the global config root.
    pub fn with_log_dir(dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            log_path: dir.join("codepunk.log"),
            verbose: false,
        })
    }

    pub fn record_event(&self, event: &LogEvent) -> Result<()> {
        self.append_log_line("EVENT", &serde_json::to_string(event)?)
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Echo `msg` to stderr with a `[codepunk]` prefix when verbose mode is on.
    pub fn verbose_log(&self, msg: &str) {
        if self.verbose {
            eprintln!("[codepunk] {msg}");
        }
    }

    /// Always echoes to stderr, verbose or not, and is also written to the log file.
    pub fn warn_log(&self, msg: &str) {
        eprintln!("[codepunk WARN] {msg}");
        let _ = self.append_log_line("WARN", msg);
    }

    fn append_log_line(&self, level: &str, payload: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "{} {level} {payload}", Utc::now().to_rfc3339())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_event_writes_one_json_line() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Observer::with_log_dir(dir.path()).unwrap();
        observer
            .record_event(&LogEvent::PlanCreated {
                plan_id: "p1".to_string(),
                goal: "add readme".to_string(),
            })
            .unwrap();

        let contents = std::fs::read_to_string(dir.path().join("codepunk.log")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("EVENT"));
        assert!(lines[0].contains("PlanCreated"));
        assert!(lines[0].contains("add readme"));
    }

    #[test]
    fn verbose_log_is_silent_when_verbose_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Observer::with_log_dir(dir.path()).unwrap();
        assert!(!observer.is_verbose());
        observer.verbose_log("should not print");
    }

    #[test]
    fn warn_log_appends_to_file_regardless_of_verbosity() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Observer::with_log_dir(dir.path()).unwrap();
        observer.warn_log("careful");
        let contents = std::fs::read_to_string(dir.path().join("codepunk.log")).unwrap();
        assert!(contents.contains("WARN careful"));
    }

    #[test]
    fn set_verbose_toggles_is_verbose() {
        let dir = tempfile::tempdir().unwrap();
        let mut observer = Observer::with_log_dir(dir.path()).unwrap();
        observer.set_verbose(true);
        assert!(observer.is_verbose());
    }
}
