use thiserror::Error;

/// Errors the Git Session Service (C11) and reaper (C12) can produce.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not a git repository")]
    NotARepo,
    #[error("sessions are disabled")]
    Disabled,
    #[error("no active session")]
    NoActiveSession,
    #[error("git worktree add failed: {0}")]
    WorktreeAddFailed(String),
    #[error("failed to apply patch to the original working directory: {0}")]
    PatchApplyFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
