use codepunk_core::{atomic_write, GitSessionState};
use std::path::{Path, PathBuf};

/// `<config-root>/git-sessions/<sessionId>.json`.
pub struct GitSessionStore {
    sessions_dir: PathBuf,
}

impl GitSessionStore {
    pub fn new(config_root: &Path) -> Self {
        Self {
            sessions_dir: config_root.join("git-sessions"),
        }
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    pub fn save(&self, state: &GitSessionState) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.sessions_dir)?;
        let rendered = serde_json::to_string_pretty(state)?;
        atomic_write(&self.path(&state.session_id), rendered.as_bytes())
    }

    pub fn load(&self, session_id: &str) -> anyhow::Result<GitSessionState> {
        let raw = std::fs::read_to_string(self.path(session_id))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn delete(&self, session_id: &str) -> anyhow::Result<()> {
        let path = self.path(session_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Every persisted session, for the reaper (C12) to scan at startup.
    pub fn list_all(&self) -> anyhow::Result<Vec<GitSessionState>> {
        let mut states = Vec::new();
        if !self.sessions_dir.exists() {
            return Ok(states);
        }
        for entry in std::fs::read_dir(&self.sessions_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(raw) = std::fs::read_to_string(&path) {
                if let Ok(state) = serde_json::from_str::<GitSessionState>(&raw) {
                    states.push(state);
                }
            }
        }
        Ok(states)
    }

    /// The one non-terminal session, if any (accepted/rejected sessions
    /// delete their state file on completion, so any state still on disk
    /// here that isn't marked accepted/rejected is the active one).
    pub fn find_active(&self) -> anyhow::Result<Option<GitSessionState>> {
        Ok(self
            .list_all()?
            .into_iter()
            .find(|s| s.accepted_at.is_none() && s.rejected_at.is_none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_state(session_id: &str) -> GitSessionState {
        GitSessionState {
            session_id: session_id.to_string(),
            shadow_branch: format!("ai/session-{session_id}"),
            original_branch: "main".to_string(),
            worktree_path: PathBuf::from("/tmp/worktree"),
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
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitSessionStore::new(dir.path());
        let state = sample_state("abc123");
        store.save(&state).unwrap();

        let loaded = store.load("abc123").unwrap();
        assert_eq!(loaded.shadow_branch, "ai/session-abc123");
    }

    #[test]
    fn delete_removes_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitSessionStore::new(dir.path());
        store.save(&sample_state("to-delete")).unwrap();
        store.delete("to-delete").unwrap();
        assert!(store.load("to-delete").is_err());
    }

    #[test]
    fn delete_on_missing_session_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitSessionStore::new(dir.path());
        assert!(store.delete("never-existed").is_ok());
    }

    #[test]
    fn find_active_skips_accepted_and_rejected_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitSessionStore::new(dir.path());

        let mut accepted = sample_state("accepted-one");
        accepted.accepted_at = Some(Utc::now());
        store.save(&accepted).unwrap();

        let active = sample_state("still-active");
        store.save(&active).unwrap();

        let found = store.find_active().unwrap().unwrap();
        assert_eq!(found.session_id, "still-active");
    }

    #[test]
    fn find_active_returns_none_when_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = GitSessionStore::new(dir.path());
        assert!(store.find_active().unwrap().is_none());
    }
}
