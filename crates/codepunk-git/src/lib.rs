//! Git Command Executor, Working-Directory Provider, Git Session Service,
//! and the Orphaned Session Reaper (C8/C9/C11/C12).

pub mod errors;
pub mod executor;
pub mod reaper;
pub mod session_service;
pub mod workdir;

pub use errors::SessionError;
pub use executor::{
    GitResult, WorktreeRecord, current_branch, is_git_repo, list_worktrees, parse_worktree_list,
    run_git,
};
pub use reaper::{ReapReport, reap_orphaned_sessions};
pub use session_service::GitSessionService;
pub use workdir::WorkingDirectoryProvider;
