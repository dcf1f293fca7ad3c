//! `config show`: prints the resolved `AppConfig` as-is — there's nothing
//! secret in it, so no redaction pass is needed before printing.

use crate::context::Context;
use crate::output::print_json;
use anyhow::Result;
use serde_json::json;

pub(crate) fn run_show(ctx: &Context, json_mode: bool) -> Result<()> {
    let cfg = &ctx.config;
    if json_mode {
        print_json(&json!({
            "schema": "config.show.v1",
            "configPath": codepunk_core::AppConfig::config_path()?,
            "plan": {
                "maxFiles": cfg.plan.max_files,
                "maxPathLength": cfg.plan.max_path_length,
                "maxPerFileBytes": cfg.plan.max_per_file_bytes,
                "maxTotalBytes": cfg.plan.max_total_bytes,
                "retryInvalidOutput": cfg.plan.retry_invalid_output,
                "secretPatterns": cfg.plan.secret_patterns,
                "maxModelOutputBytes": cfg.plan.max_model_output_bytes,
            },
            "git": {
                "worktreeBase": cfg.git.worktree_base,
                "shadowBranchPrefix": cfg.git.shadow_branch_prefix,
                "sessionTimeoutMinutes": cfg.git.session_timeout_minutes,
                "autoRevertOnTimeout": cfg.git.auto_revert_on_timeout,
                "keepFailedSessionBranches": cfg.git.keep_failed_session_branches,
                "allowHeuristicWebsiteScaffold": cfg.git.allow_heuristic_website_scaffold,
            },
            "sessions": { "enabled": cfg.sessions.enabled },
            "telemetry": { "verbose": cfg.telemetry.verbose },
        }))?;
    } else {
        println!("config: {}", codepunk_core::AppConfig::config_path()?.display());
        println!("  plan.maxFiles = {}", cfg.plan.max_files);
        println!("  plan.maxTotalBytes = {}", cfg.plan.max_total_bytes);
        println!("  git.sessionTimeoutMinutes = {}", cfg.git.session_timeout_minutes);
        println!(
            "  git.allowHeuristicWebsiteScaffold = {}",
            cfg.git.allow_heuristic_website_scaffold
        );
    }
    Ok(())
}
