//! Orphaned Session Reaper (C12).
//!
//! Runs once at startup: loads every persisted session state and
//! auto-reverts any that are abandoned. Never touches a session already
//! marked `accepted` (accepted sessions delete their own state file, so in
//! practice there is nothing to find, but the guard is explicit here anyway
//! since it's an invariant worth keeping, not just an implementation detail).

use crate::errors::SessionError;
use crate::session_service::GitSessionService;
use chrono::Utc;
use codepunk_core::GitSessionState;

#[derive(Debug, Clone, Default)]
pub struct ReapReport {
    pub reverted: Vec<String>,
    pub skipped_accepted: Vec<String>,
}

/// Auto-revert criteria: rejected or failed, timed out since
/// `last_activity_at`, or the worktree directory is missing.
fn should_reap(state: &GitSessionState, session_timeout_minutes: u64) -> bool {
    if state.rejected_at.is_some() || state.is_failed {
        return true;
    }
    if !state.worktree_path.exists() {
        return true;
    }
    let elapsed = Utc::now().signed_duration_since(state.last_activity_at);
    elapsed.num_minutes() >= session_timeout_minutes as i64
}

pub fn reap_orphaned_sessions(
    service: &GitSessionService,
    states: Vec<GitSessionState>,
    session_timeout_minutes: u64,
) -> Result<ReapReport, SessionError> {
    let mut report = ReapReport::default();
    for state in states {
        if state.accepted_at.is_some() {
            report.skipped_accepted.push(state.session_id);
            continue;
        }
        if should_reap(&state, session_timeout_minutes) {
            let session_id = state.session_id.clone();
            service.reject(state, "orphaned session reaped at startup")?;
            report.reverted.push(session_id);
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::path::PathBuf;

    fn base_state() -> GitSessionState {
        GitSessionState {
            session_id: "sess".to_string(),
            shadow_branch: "ai/session-sess".to_string(),
            original_branch: "main".to_string(),
            worktree_path: PathBuf::from("/does/not/exist"),
            tool_call_commits: Vec::new(),
            started_at: Utc::now(),
            last_activity_at: Utc::now(),
            accepted_at: None,
            rejected_at: None,
            is_failed: false,
            failure_reason: None,
        }
    }

    #[test]
    fn missing_worktree_is_reaped() {
        assert!(should_reap(&base_state(), 60));
    }

    #[test]
    fn failed_session_is_reaped_regardless_of_activity() {
        let mut state = base_state();
        state.is_failed = true;
        state.worktree_path = std::env::temp_dir();
        assert!(should_reap(&state, 60));
    }

    #[test]
    fn fresh_active_session_with_existing_worktree_is_not_reaped() {
        let mut state = base_state();
        state.worktree_path = std::env::temp_dir();
        assert!(!should_reap(&state, 60));
    }

    #[test]
    fn stale_activity_past_timeout_is_reaped() {
        let mut state = base_state();
        state.worktree_path = std::env::temp_dir();
        state.last_activity_at = Utc::now() - Duration::minutes(120);
        assert!(should_reap(&state, 60));
    }
}
