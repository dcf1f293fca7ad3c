//! `session begin|accept|reject|status|list` (C11/C12).

use crate::context::Context;
use crate::output::{print_error, print_json};
use crate::{SessionAcceptArgs, SessionRejectArgs, SessionStatusArgs};
use anyhow::{anyhow, Result};
use codepunk_core::GitSessionState;
use codepunk_errors::ErrorCode;
use codepunk_git::{reap_orphaned_sessions, GitSessionService, WorkingDirectoryProvider};
use serde_json::json;

fn state_to_json(state: &GitSessionState) -> serde_json::Value {
    json!({
        "sessionId": state.session_id,
        "shadowBranch": state.shadow_branch,
        "originalBranch": state.original_branch,
        "worktreePath": state.worktree_path,
        "toolCallCommits": state.tool_call_commits,
        "startedAt": state.started_at,
        "lastActivityAt": state.last_activity_at,
        "acceptedAt": state.accepted_at,
        "rejectedAt": state.rejected_at,
        "isFailed": state.is_failed,
        "failureReason": state.failure_reason,
    })
}

fn service<'a>(
    ctx: &'a Context,
    workdir: &'a WorkingDirectoryProvider,
) -> GitSessionService<'a> {
    GitSessionService::new(
        ctx.workspace.clone(),
        ctx.config.git.clone(),
        ctx.config.sessions.enabled,
        &ctx.git_sessions,
        workdir,
        Some(&ctx.observer),
    )
}

pub(crate) fn run_begin(ctx: &Context, json_mode: bool) -> Result<()> {
    let workdir = WorkingDirectoryProvider::new(ctx.workspace.clone());
    let svc = service(ctx, &workdir);

    match svc.begin() {
        Ok(Some(state)) => {
            if json_mode {
                print_json(&json!({
                    "schema": "sessions.show.v1",
                    "session": state_to_json(&state),
                }))?;
            } else {
                println!(
                    "session {} begun on worktree {}",
                    state.session_id,
                    state.worktree_path.display()
                );
            }
            Ok(())
        }
        Ok(None) => {
            print_error(
                "sessions.show.v1",
                ErrorCode::SessionNotFound,
                "sessions are disabled or workspace is not a git repository",
                json_mode,
            )?;
            Err(anyhow!("sessions unavailable"))
        }
        Err(err) => {
            print_error("sessions.show.v1", ErrorCode::SessionNotFound, &err.to_string(), json_mode)?;
            Err(err.into())
        }
    }
}

pub(crate) fn run_accept(ctx: &Context, args: SessionAcceptArgs, json_mode: bool) -> Result<()> {
    let state = match ctx.git_sessions.load(&args.session_id) {
        Ok(state) => state,
        Err(_) => {
            print_error(
                "sessions.show.v1",
                ErrorCode::SessionNotFound,
                &format!("session {} not found", args.session_id),
                json_mode,
            )?;
            return Err(anyhow!("session not found"));
        }
    };

    let workdir = WorkingDirectoryProvider::new(ctx.workspace.clone());
    let svc = service(ctx, &workdir);
    match svc.accept(state.clone()) {
        Ok(_) => {
            if json_mode {
                print_json(&json!({
                    "schema": "sessions.show.v1",
                    "session": json!({ "sessionId": state.session_id, "accepted": true }),
                }))?;
            } else {
                println!("session {} accepted", state.session_id);
            }
            Ok(())
        }
        Err(err) => {
            print_error("sessions.show.v1", ErrorCode::SessionNotFound, &err.to_string(), json_mode)?;
            Err(err.into())
        }
    }
}

pub(crate) fn run_reject(ctx: &Context, args: SessionRejectArgs, json_mode: bool) -> Result<()> {
    let state = match ctx.git_sessions.load(&args.session_id) {
        Ok(state) => state,
        Err(_) => {
            print_error(
                "sessions.show.v1",
                ErrorCode::SessionNotFound,
                &format!("session {} not found", args.session_id),
                json_mode,
            )?;
            return Err(anyhow!("session not found"));
        }
    };

    let reason = args.reason.unwrap_or_else(|| "rejected via CLI".to_string());
    let session_id = state.session_id.clone();
    let workdir = WorkingDirectoryProvider::new(ctx.workspace.clone());
    let svc = service(ctx, &workdir);
    match svc.reject(state, &reason) {
        Ok(()) => {
            if json_mode {
                print_json(&json!({
                    "schema": "sessions.show.v1",
                    "session": json!({ "sessionId": session_id, "rejected": true, "reason": reason }),
                }))?;
            } else {
                println!("session {session_id} rejected: {reason}");
            }
            Ok(())
        }
        Err(err) => {
            print_error("sessions.show.v1", ErrorCode::SessionNotFound, &err.to_string(), json_mode)?;
            Err(err.into())
        }
    }
}

pub(crate) fn run_status(ctx: &Context, args: SessionStatusArgs, json_mode: bool) -> Result<()> {
    let state = match &args.session_id {
        Some(id) => ctx.git_sessions.load(id).ok(),
        None => ctx.git_sessions.find_active()?,
    };

    match state {
        Some(state) => {
            if json_mode {
                print_json(&json!({
                    "schema": "sessions.show.v1",
                    "session": state_to_json(&state),
                }))?;
            } else {
                println!(
                    "session {} on {} (started {})",
                    state.session_id, state.shadow_branch, state.started_at
                );
            }
            Ok(())
        }
        None => {
            print_error(
                "sessions.show.v1",
                ErrorCode::SessionNotFound,
                "no active session",
                json_mode,
            )?;
            Err(anyhow!("no active session"))
        }
    }
}

pub(crate) fn run_list(ctx: &Context, json_mode: bool) -> Result<()> {
    let sessions = ctx.git_sessions.list_all()?;
    if json_mode {
        print_json(&json!({
            "schema": "sessions.list.v1",
            "sessions": sessions.iter().map(state_to_json).collect::<Vec<_>>(),
        }))?;
    } else if sessions.is_empty() {
        println!("no sessions");
    } else {
        for s in &sessions {
            println!("{}  {}", s.session_id, s.shadow_branch);
        }
    }
    Ok(())
}

/// Startup orphan sweep (C12): not itself a dedicated schema, reuses
/// `sessions.list.v1` since its payload is the same shape (a list of
/// session ids, here annotated with their outcome).
pub(crate) fn run_reap(ctx: &Context, json_mode: bool) -> Result<()> {
    let workdir = WorkingDirectoryProvider::new(ctx.workspace.clone());
    let svc = service(ctx, &workdir);
    let states = ctx.git_sessions.list_all()?;
    let report = reap_orphaned_sessions(&svc, states, ctx.config.git.session_timeout_minutes)?;

    if json_mode {
        print_json(&json!({
            "schema": "sessions.list.v1",
            "reverted": report.reverted,
            "skippedAccepted": report.skipped_accepted,
        }))?;
    } else {
        println!(
            "reaped {} orphaned session(s), skipped {} accepted",
            report.reverted.len(),
            report.skipped_accepted.len()
        );
    }
    Ok(())
}
