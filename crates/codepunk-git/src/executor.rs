//! Git Command Executor (C8).
//!
//! Spawns `git` with an explicit working directory and never throws on a
//! non-zero exit — every invocation reports `{success, output, error,
//! exit_code}` so callers make the policy decision.

use std::path::Path;
use std::process::Command;

/// Outcome of one `git` subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitResult {
    pub success: bool,
    pub output: String,
    pub error: String,
    pub exit_code: Option<i32>,
}

impl GitResult {
    /// `output` trimmed of trailing newline, for callers that want a single line.
    pub fn output_trimmed(&self) -> &str {
        self.output.trim_end()
    }
}

/// Runs `git <args>` with `cwd` as the working directory.
pub fn run_git(cwd: &Path, args: &[&str]) -> GitResult {
    match Command::new("git").current_dir(cwd).args(args).output() {
        Ok(output) => GitResult {
            success: output.status.success(),
            output: String::from_utf8_lossy(&output.stdout).into_owned(),
            error: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        },
        Err(err) => GitResult {
            success: false,
            output: String::new(),
            error: format!("failed to spawn git {args:?}: {err}"),
            exit_code: None,
        },
    }
}

/// Whether `cwd` is inside a git working tree.
pub fn is_git_repo(cwd: &Path) -> bool {
    run_git(cwd, &["rev-parse", "--is-inside-work-tree"]).success
}

/// The current branch name, or `None` when `cwd` is not a repo or HEAD is detached.
pub fn current_branch(cwd: &Path) -> Option<String> {
    let result = run_git(cwd, &["rev-parse", "--abbrev-ref", "HEAD"]);
    if !result.success {
        return None;
    }
    let branch = result.output_trimmed().to_string();
    if branch.is_empty() || branch == "HEAD" {
        None
    } else {
        Some(branch)
    }
}

/// One record parsed out of `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeRecord {
    pub path: String,
    pub head: Option<String>,
    pub branch: Option<String>,
}

/// Parses `git worktree list --porcelain` output: records separated by blank
/// lines, `worktree <path>`, `HEAD <sha>`, `branch refs/heads/<name>`.
pub fn parse_worktree_list(porcelain: &str) -> Vec<WorktreeRecord> {
    let mut records = Vec::new();
    let mut path = None;
    let mut head = None;
    let mut branch = None;

    let flush = |path: &mut Option<String>, head: &mut Option<String>, branch: &mut Option<String>, out: &mut Vec<WorktreeRecord>| {
        if let Some(p) = path.take() {
            out.push(WorktreeRecord {
                path: p,
                head: head.take(),
                branch: branch.take(),
            });
        }
        *head = None;
        *branch = None;
    };

    for line in porcelain.lines() {
        if line.is_empty() {
            flush(&mut path, &mut head, &mut branch, &mut records);
            continue;
        }
        if let Some(rest) = line.strip_prefix("worktree ") {
            flush(&mut path, &mut head, &mut branch, &mut records);
            path = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("HEAD ") {
            head = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("branch ") {
            branch = Some(
                rest.strip_prefix("refs/heads/")
                    .unwrap_or(rest)
                    .to_string(),
            );
        }
    }
    flush(&mut path, &mut head, &mut branch, &mut records);
    records
}

pub fn list_worktrees(cwd: &Path) -> anyhow::Result<Vec<WorktreeRecord>> {
    let result = run_git(cwd, &["worktree", "list", "--porcelain"]);
    if !result.success {
        anyhow::bail!("git worktree list failed: {}", result.error);
    }
    Ok(parse_worktree_list(&result.output))
}
