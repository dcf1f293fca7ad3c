//! Git Session Service (C11).
//!
//! Drives the `None → Active → {Accepted, Rejected, Failed}` state machine
//! over a git-worktree-isolated shadow branch. Grounded in `team.rs`'s
//! lane-worktree pattern (`add_worktree`/`remove_worktree`) and
//! `deepseek-diff`'s `PatchStore::apply` (`git apply` with stderr-as-conflict
//! reporting), generalized from "one lane per lane-spec" to "one session per
//! accept/reject lifecycle".

use crate::errors::SessionError;
use crate::executor::{current_branch, is_git_repo, run_git};
use crate::workdir::WorkingDirectoryProvider;
use chrono::Utc;
use codepunk_core::{GitSessionState, GitToolCallCommit, GitWorkflowConfig};
use codepunk_observe::Observer;
use codepunk_store::GitSessionStore;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct GitSessionService<'a> {
    workspace: PathBuf,
    cfg: GitWorkflowConfig,
    enabled: bool,
    store: &'a GitSessionStore,
    workdir: &'a WorkingDirectoryProvider,
    observer: Option<&'a Observer>,
}

impl<'a> GitSessionService<'a> {
    pub fn new(
        workspace: PathBuf,
        cfg: GitWorkflowConfig,
        enabled: bool,
        store: &'a GitSessionStore,
        workdir: &'a WorkingDirectoryProvider,
        observer: Option<&'a Observer>,
    ) -> Self {
        Self {
            workspace,
            cfg,
            enabled,
            store,
            workdir,
            observer,
        }
    }

    fn worktree_base(&self) -> PathBuf {
        self.cfg
            .worktree_base
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("codepunk-sessions"))
    }

    fn log(&self, msg: &str) {
        if let Some(observer) = self.observer {
            observer.verbose_log(msg);
        }
    }

    /// Begin algorithm: auto-revert any existing active session, then create
    /// a worktree on a fresh shadow branch.
    ///
    /// Returns `Ok(None)` when sessions are disabled or `workspace` is not a
    /// git repository — not an error, a policy no-op.
    pub fn begin(&self) -> Result<Option<GitSessionState>, SessionError> {
        if !self.enabled {
            return Ok(None);
        }
        if !is_git_repo(&self.workspace) {
            return Ok(None);
        }

        if let Some(existing) = self.store.find_active().map_err(SessionError::Other)? {
            self.log(&format!(
                "auto-reverting active session {} before starting a new one",
                existing.session_id
            ));
            self.revert(existing, false, "New session started")?;
        }

        let original_branch = current_branch(&self.workspace)
            .ok_or_else(|| SessionError::Other(anyhow::anyhow!("cannot resolve current branch")))?;
        let session_id = Uuid::new_v4().simple().to_string();
        let shadow_branch = format!("{}-{}", self.cfg.shadow_branch_prefix, &session_id[..8]);
        let worktree_path = self.worktree_base().join(&session_id);

        std::fs::create_dir_all(self.worktree_base())?;

        let worktree_path_str = worktree_path.to_string_lossy().into_owned();
        let add = run_git(
            &self.workspace,
            &["worktree", "add", &worktree_path_str, "-b", &shadow_branch],
        );
        if !add.success {
            return Err(SessionError::WorktreeAddFailed(add.error));
        }

        self.workdir.set(worktree_path.clone());

        let now = Utc::now();
        let state = GitSessionState {
            session_id,
            shadow_branch,
            original_branch,
            worktree_path,
            tool_call_commits: Vec::new(),
            started_at: now,
            last_activity_at: now,
            accepted_at: None,
            rejected_at: None,
            is_failed: false,
            failure_reason: None,
        };
        self.store.save(&state).map_err(SessionError::Other)?;
        self.log(&format!("session {} begun on {}", state.session_id, state.shadow_branch));
        Ok(Some(state))
    }

    /// `git add -A`; if there are changes, commit with
    /// `"AI Tool: <tool> - <summary>"` and record the commit.
    pub fn commit_tool_call(
        &self,
        state: &mut GitSessionState,
        tool_name: &str,
        summary: &str,
    ) -> Result<bool, SessionError> {
        run_git(&state.worktree_path, &["add", "-A"]);
        let status = run_git(&state.worktree_path, &["status", "--porcelain"]);
        if status.output.trim().is_empty() {
            self.update_activity(state);
            return Ok(false);
        }

        let files_changed: Vec<String> = status
            .output
            .lines()
            .filter_map(|line| line.get(3..).map(str::to_string))
            .collect();

        let message = format!("AI Tool: {tool_name} - {summary}");
        let commit = run_git(&state.worktree_path, &["commit", "-m", &message]);
        if !commit.success {
            return Err(SessionError::Other(anyhow::anyhow!(
                "git commit failed: {}",
                commit.error
            )));
        }

        let hash = run_git(&state.worktree_path, &["rev-parse", "HEAD"]);
        state.tool_call_commits.push(GitToolCallCommit {
            tool_name: tool_name.to_string(),
            commit_hash: hash.output_trimmed().to_string(),
            committed_at: Utc::now(),
            files_changed,
        });
        self.update_activity(state);
        self.store.save(state).map_err(SessionError::Other)?;
        Ok(true)
    }

    pub fn update_activity(&self, state: &mut GitSessionState) {
        state.last_activity_at = Utc::now();
    }

    /// Accept algorithm: diff shadow vs. original branch, `git apply` the
    /// patch into the *original* working directory (never the worktree),
    /// then tear down the worktree and shadow branch.
    pub fn accept(&self, mut state: GitSessionState) -> Result<bool, SessionError> {
        let diff = run_git(
            &state.worktree_path,
            &["diff", &state.original_branch, "--binary"],
        );
        if !diff.success {
            return Err(SessionError::Other(anyhow::anyhow!(
                "git diff failed: {}",
                diff.error
            )));
        }

        if !diff.output.trim().is_empty() {
            let patch_file = state.worktree_path.with_extension("patch");
            std::fs::write(&patch_file, &diff.output)?;
            let apply = run_git(&self.workspace, &["apply", &patch_file.to_string_lossy()]);
            let _ = std::fs::remove_file(&patch_file);
            if !apply.success {
                self.log(&format!(
                    "accept failed to apply patch for session {}: {}",
                    state.session_id, apply.error
                ));
                return Err(SessionError::PatchApplyFailed(apply.error));
            }
        }

        self.remove_worktree_and_branch(&state, true);

        state.accepted_at = Some(Utc::now());
        self.store.save(&state).map_err(SessionError::Other)?;
        self.store
            .delete(&state.session_id)
            .map_err(SessionError::Other)?;
        self.workdir.clear();
        self.log(&format!("session {} accepted", state.session_id));
        Ok(true)
    }

    /// Reject algorithm: tear down without touching the user's working
    /// directory.
    pub fn reject(&self, state: GitSessionState, reason: &str) -> Result<(), SessionError> {
        self.revert(state, false, reason)
    }

    pub fn fail(&self, mut state: GitSessionState, reason: String) -> Result<(), SessionError> {
        state.is_failed = true;
        state.failure_reason = Some(reason);
        self.store.save(&state).map_err(SessionError::Other)?;
        self.log(&format!(
            "session {} marked failed: {}",
            state.session_id,
            state.failure_reason.as_deref().unwrap_or("")
        ));
        Ok(())
    }

    /// Shared teardown for Reject and auto-revert-on-new-Begin.
    fn revert(
        &self,
        mut state: GitSessionState,
        is_failed_override: bool,
        reason: &str,
    ) -> Result<(), SessionError> {
        let is_failed = state.is_failed || is_failed_override;
        let keep_branch = self.cfg.keep_failed_session_branches && is_failed;
        self.remove_worktree_and_branch(&state, !keep_branch);

        state.rejected_at = Some(Utc::now());
        self.store.save(&state).map_err(SessionError::Other)?;
        self.store
            .delete(&state.session_id)
            .map_err(SessionError::Other)?;
        self.workdir.clear();
        self.log(&format!("session {} reverted: {reason}", state.session_id));
        Ok(())
    }

    /// Failure model: a crash at any point must leave recoverable artifacts;
    /// every teardown path attempts a filesystem `rm -rf` fallback when
    /// `git worktree remove` itself fails.
    fn remove_worktree_and_branch(&self, state: &GitSessionState, delete_branch: bool) {
        let worktree_path_str = state.worktree_path.to_string_lossy().into_owned();
        let remove = run_git(
            &self.workspace,
            &["worktree", "remove", &worktree_path_str, "--force"],
        );
        if !remove.success && state.worktree_path.exists() {
            let _ = std::fs::remove_dir_all(&state.worktree_path);
            let _ = run_git(&self.workspace, &["worktree", "prune"]);
        }
        if delete_branch {
            run_git(&self.workspace, &["branch", "-D", &state.shadow_branch]);
        }
    }
}

pub(crate) fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub(crate) fn git(workspace: &Path, args: &[&str]) -> anyhow::Result<String> {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(workspace)
        .output()?;
    if !output.status.success() {
        anyhow::bail!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "-q", "-b", "main"]).unwrap();
        git(dir.path(), &["config", "user.email", "test@example.com"]).unwrap();
        git(dir.path(), &["config", "user.name", "Test"]).unwrap();
        fs::write(dir.path().join("README.md"), "hello\n").unwrap();
        git(dir.path(), &["add", "-A"]).unwrap();
        git(dir.path(), &["commit", "-q", "-m", "initial"]).unwrap();
        dir
    }

    #[test]
    fn begin_returns_none_for_non_repo() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let store = GitSessionStore::new(dir.path());
        let workdir = WorkingDirectoryProvider::new(dir.path().to_path_buf());
        let mut cfg = GitWorkflowConfig::default();
        cfg.worktree_base = Some(dir.path().join("sessions"));
        let service = GitSessionService::new(dir.path().to_path_buf(), cfg, true, &store, &workdir, None);
        assert!(service.begin().unwrap().is_none());
    }

    #[test]
    fn begin_returns_none_when_sessions_disabled() {
        if !git_available() {
            return;
        }
        let repo = init_repo();
        let store = GitSessionStore::new(repo.path());
        let workdir = WorkingDirectoryProvider::new(repo.path().to_path_buf());
        let mut cfg = GitWorkflowConfig::default();
        cfg.worktree_base = Some(repo.path().join("sessions"));
        let service =
            GitSessionService::new(repo.path().to_path_buf(), cfg, false, &store, &workdir, None);
        assert!(service.begin().unwrap().is_none());
    }

    #[test]
    fn begin_creates_worktree_and_overrides_workdir() {
        if !git_available() {
            return;
        }
        let repo = init_repo();
        let store = GitSessionStore::new(repo.path());
        let workdir = WorkingDirectoryProvider::new(repo.path().to_path_buf());
        let mut cfg = GitWorkflowConfig::default();
        cfg.worktree_base = Some(repo.path().join("sessions"));
        let service =
            GitSessionService::new(repo.path().to_path_buf(), cfg, true, &store, &workdir, None);

        let state = service.begin().unwrap().unwrap();
        assert!(state.worktree_path.exists());
        assert_eq!(workdir.get(), state.worktree_path);
        assert_eq!(state.original_branch, "main");

        service.reject(state, "test cleanup").unwrap();
    }

    #[test]
    fn commit_tool_call_records_commit_and_files() {
        if !git_available() {
            return;
        }
        let repo = init_repo();
        let store = GitSessionStore::new(repo.path());
        let workdir = WorkingDirectoryProvider::new(repo.path().to_path_buf());
        let mut cfg = GitWorkflowConfig::default();
        cfg.worktree_base = Some(repo.path().join("sessions"));
        let service =
            GitSessionService::new(repo.path().to_path_buf(), cfg, true, &store, &workdir, None);

        let mut state = service.begin().unwrap().unwrap();
        fs::write(state.worktree_path.join("new.txt"), "hello").unwrap();
        let committed = service
            .commit_tool_call(&mut state, "write_file", "create new.txt")
            .unwrap();
        assert!(committed);
        assert_eq!(state.tool_call_commits.len(), 1);
        assert_eq!(state.tool_call_commits[0].tool_name, "write_file");
        assert!(
            state.tool_call_commits[0]
                .files_changed
                .iter()
                .any(|f| f == "new.txt")
        );

        service.reject(state, "test cleanup").unwrap();
    }

    #[test]
    fn commit_tool_call_is_a_no_op_when_nothing_changed() {
        if !git_available() {
            return;
        }
        let repo = init_repo();
        let store = GitSessionStore::new(repo.path());
        let workdir = WorkingDirectoryProvider::new(repo.path().to_path_buf());
        let mut cfg = GitWorkflowConfig::default();
        cfg.worktree_base = Some(repo.path().join("sessions"));
        let service =
            GitSessionService::new(repo.path().to_path_buf(), cfg, true, &store, &workdir, None);

        let mut state = service.begin().unwrap().unwrap();
        let committed = service
            .commit_tool_call(&mut state, "noop_tool", "did nothing")
            .unwrap();
        assert!(!committed);
        assert!(state.tool_call_commits.is_empty());

        service.reject(state, "test cleanup").unwrap();
    }

    #[test]
    fn accept_applies_patch_as_unstaged_change_and_tears_down_session() {
        if !git_available() {
            return;
        }
        let repo = init_repo();
        let store = GitSessionStore::new(repo.path());
        let workdir = WorkingDirectoryProvider::new(repo.path().to_path_buf());
        let mut cfg = GitWorkflowConfig::default();
        cfg.worktree_base = Some(repo.path().join("sessions"));
        let service =
            GitSessionService::new(repo.path().to_path_buf(), cfg, true, &store, &workdir, None);

        let mut state = service.begin().unwrap().unwrap();
        let worktree_path = state.worktree_path.clone();
        let shadow_branch = state.shadow_branch.clone();
        fs::write(worktree_path.join("new.txt"), "hello").unwrap();
        service
            .commit_tool_call(&mut state, "write_file", "create new.txt")
            .unwrap();

        let accepted = service.accept(state).unwrap();
        assert!(accepted);

        assert_eq!(
            fs::read_to_string(repo.path().join("new.txt")).unwrap(),
            "hello"
        );
        let status = git(repo.path(), &["status", "--porcelain"]).unwrap();
        assert!(status.contains("new.txt"));

        assert!(!worktree_path.exists());
        let branches = git(repo.path(), &["branch", "--list", &shadow_branch]).unwrap();
        assert!(branches.trim().is_empty());

        assert!(store.find_active().unwrap().is_none());
    }

    #[test]
    fn reject_leaves_user_workspace_untouched() {
        if !git_available() {
            return;
        }
        let repo = init_repo();
        let store = GitSessionStore::new(repo.path());
        let workdir = WorkingDirectoryProvider::new(repo.path().to_path_buf());
        let mut cfg = GitWorkflowConfig::default();
        cfg.worktree_base = Some(repo.path().join("sessions"));
        let service =
            GitSessionService::new(repo.path().to_path_buf(), cfg, true, &store, &workdir, None);

        let mut state = service.begin().unwrap().unwrap();
        let worktree_path = state.worktree_path.clone();
        fs::write(worktree_path.join("new.txt"), "hello").unwrap();
        service
            .commit_tool_call(&mut state, "write_file", "create new.txt")
            .unwrap();

        service.reject(state, "user declined").unwrap();

        assert!(!repo.path().join("new.txt").exists());
        let status = git(repo.path(), &["status", "--porcelain"]).unwrap();
        assert!(status.trim().is_empty());
        assert!(!worktree_path.exists());
    }

    #[test]
    fn beginning_a_new_session_auto_reverts_the_active_one() {
        if !git_available() {
            return;
        }
        let repo = init_repo();
        let store = GitSessionStore::new(repo.path());
        let workdir = WorkingDirectoryProvider::new(repo.path().to_path_buf());
        let mut cfg = GitWorkflowConfig::default();
        cfg.worktree_base = Some(repo.path().join("sessions"));
        let service =
            GitSessionService::new(repo.path().to_path_buf(), cfg, true, &store, &workdir, None);

        let first = service.begin().unwrap().unwrap();
        let first_worktree = first.worktree_path.clone();
        let second = service.begin().unwrap().unwrap();

        assert!(!first_worktree.exists());
        assert!(store.load(&first.session_id).is_err());
        assert_eq!(workdir.get(), second.worktree_path);

        service.reject(second, "test cleanup").unwrap();
    }
}
