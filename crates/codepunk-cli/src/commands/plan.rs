//! `plan create|add|list|show|diff|apply|generate` (C4–C7).

use crate::context::Context;
use crate::output::{print_error, print_json};
use crate::{
    PlanAddArgs, PlanApplyArgs, PlanCreateArgs, PlanDiffArgs, PlanGenerateArgs, PlanShowArgs,
};
use anyhow::{anyhow, Result};
use codepunk_errors::ErrorCode;
use codepunk_plan::{generate_and_persist, NullProvider, PlanEngine, PlanError};
use codepunk_session::{summarize, Role, SessionMessage, SummarizeOptions};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct RawMessage {
    role: String,
    text: String,
}

fn parse_role(raw: &str) -> Option<Role> {
    match raw.to_ascii_lowercase().as_str() {
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        "tool" => Some(Role::Tool),
        _ => None,
    }
}

pub(crate) fn run_create(ctx: &Context, args: PlanCreateArgs, json_mode: bool) -> Result<()> {
    if let Some(transcript_path) = args.from_session {
        return run_create_from_session(ctx, transcript_path, args.max_messages, json_mode);
    }

    let goal = args
        .goal
        .ok_or_else(|| anyhow!("`plan create` requires either --goal or --from-session"))?;
    let record = ctx.plans.create(goal.clone())?;
    if json_mode {
        print_json(&json!({
            "schema": "plan.create.v1",
            "planId": record.definition.id,
            "goal": record.definition.goal,
        }))?;
    } else {
        println!("created plan {} ({})", record.definition.id, goal);
    }
    Ok(())
}

fn run_create_from_session(
    ctx: &Context,
    transcript_path: PathBuf,
    max_messages: Option<usize>,
    json_mode: bool,
) -> Result<()> {
    let raw = fs::read_to_string(&transcript_path)?;
    let raw_messages: Vec<RawMessage> = serde_json::from_str(&raw)?;
    let messages: Vec<SessionMessage> = raw_messages
        .into_iter()
        .filter_map(|m| {
            parse_role(&m.role).map(|role| SessionMessage { role, text: m.text })
        })
        .collect();

    let mut opts = SummarizeOptions::default();
    if let Some(max) = max_messages {
        opts.max_messages = max;
    }

    let Some(summary) = summarize(&messages, opts) else {
        return {
            print_error(
                "plan.create.fromSession.v1",
                ErrorCode::InsufficientSessionContext,
                "fewer than 2 user messages in the transcript",
                json_mode,
            )?;
            Err(anyhow!("insufficient session context"))
        };
    };

    let mut record = ctx.plans.create(summary.goal.clone())?;
    record.summary = Some(summary.clone());
    ctx.plans.save(&record)?;

    if json_mode {
        print_json(&json!({
            "schema": "plan.create.fromSession.v1",
            "planId": record.definition.id,
            "goal": summary.goal,
            "candidateFiles": summary.candidate_files,
            "messageSampleCount": summary.used_messages,
            "truncated": summary.truncated,
            "tokenUsageApprox": {
                "sampleChars": summary.token_usage.sample_chars,
                "approxTokens": summary.token_usage.approx_tokens,
            },
        }))?;
    } else {
        println!(
            "created plan {} from session ({} candidate file(s))",
            record.definition.id,
            summary.candidate_files.len()
        );
    }
    Ok(())
}

pub(crate) fn run_add(ctx: &Context, args: PlanAddArgs, json_mode: bool) -> Result<()> {
    let engine = PlanEngine::new(&ctx.plans, ctx.workspace.clone());
    let after_content = args
        .after_file
        .as_ref()
        .map(fs::read_to_string)
        .transpose()?;
    let has_after = after_content.is_some();

    engine.stage(&args.plan_id, &args.path, after_content, args.delete, args.rationale)?;

    let action = if args.delete {
        "delete"
    } else if has_after {
        "modify"
    } else {
        "snapshot"
    };

    if json_mode {
        print_json(&json!({
            "schema": "plan.add.v1",
            "planId": args.plan_id,
            "path": args.path,
            "action": action,
            "hasAfter": has_after,
            "isDelete": args.delete,
        }))?;
    } else {
        println!("staged {} ({action}) on plan {}", args.path, args.plan_id);
    }
    Ok(())
}

pub(crate) fn run_list(ctx: &Context, json_mode: bool) -> Result<()> {
    let plans = ctx.plans.list()?;
    if json_mode {
        print_json(&json!({
            "schema": "plan.list.v1",
            "plans": plans.iter().map(|d| json!({
                "id": d.id,
                "goal": d.goal,
                "createdUtc": d.created_utc,
            })).collect::<Vec<_>>(),
        }))?;
    } else if plans.is_empty() {
        println!("no plans");
    } else {
        for d in &plans {
            println!("{}  {}", d.id, d.goal);
        }
    }
    Ok(())
}

pub(crate) fn run_show(ctx: &Context, args: PlanShowArgs, json_mode: bool) -> Result<()> {
    let record = match ctx.plans.load(&args.plan_id) {
        Ok(record) => record,
        Err(_) => {
            print_error(
                "plan.show.v1",
                ErrorCode::InputMissing,
                &format!("plan {} not found", args.plan_id),
                json_mode,
            )?;
            return Err(anyhow!("plan not found"));
        }
    };

    if json_mode {
        print_json(&json!({
            "schema": "plan.show.v1",
            "planId": record.definition.id,
            "goal": record.definition.goal,
            "createdUtc": record.definition.created_utc,
            "files": record.files,
            "summary": record.summary,
            "generation": record.generation,
        }))?;
    } else {
        println!("plan {}: {}", record.definition.id, record.definition.goal);
        for f in &record.files {
            println!("  {} (delete={})", f.path, f.is_delete);
        }
    }
    Ok(())
}

pub(crate) fn run_diff(ctx: &Context, args: PlanDiffArgs, json_mode: bool) -> Result<()> {
    let engine = PlanEngine::new(&ctx.plans, ctx.workspace.clone());
    let diffs = match engine.diff(&args.plan_id) {
        Ok(diffs) => diffs,
        Err(_) => {
            print_error(
                "plan.diff.v1",
                ErrorCode::InputMissing,
                &format!("plan {} not found", args.plan_id),
                json_mode,
            )?;
            return Err(anyhow!("plan not found"));
        }
    };

    if json_mode {
        print_json(&json!({
            "schema": "plan.diff.v1",
            "planId": args.plan_id,
            "files": diffs.iter().map(|(path, diff)| json!({
                "path": path,
                "diff": diff,
            })).collect::<Vec<_>>(),
        }))?;
    } else {
        for (path, diff) in &diffs {
            println!("--- {path} ---");
            if let Some(diff) = diff {
                println!("{diff}");
            } else {
                println!("(no diff: snapshot only)");
            }
        }
    }
    Ok(())
}

pub(crate) fn run_apply(ctx: &Context, args: PlanApplyArgs, json_mode: bool) -> Result<()> {
    let engine = PlanEngine::new(&ctx.plans, ctx.workspace.clone());
    let report = match engine.apply(&args.plan_id, args.dry_run, args.force) {
        Ok(report) => report,
        Err(_) => {
            print_error(
                "plan.apply.v1",
                ErrorCode::InputMissing,
                &format!("plan {} not found", args.plan_id),
                json_mode,
            )?;
            return Err(anyhow!("plan not found"));
        }
    };

    if json_mode {
        print_json(&json!({
            "schema": "plan.apply.v1",
            "planId": args.plan_id,
            "summary": {
                "applied": report.summary.applied,
                "skipped": report.summary.skipped,
                "drift": report.summary.drift,
                "backedUp": report.summary.backed_up,
            },
            "files": report.per_file.iter().map(|f| json!({
                "path": f.path,
                "action": f.action,
                "hadDrift": f.had_drift,
                "backupPath": f.backup_path,
            })).collect::<Vec<_>>(),
        }))?;
    } else {
        println!(
            "applied={} skipped={} drift={} backedUp={}",
            report.summary.applied, report.summary.skipped, report.summary.drift, report.summary.backed_up
        );
        for f in &report.per_file {
            println!("  {} -> {:?}", f.path, f.action);
        }
    }
    // Drift without `--force` is a normal per-file outcome, never a nonzero exit.
    Ok(())
}

pub(crate) fn run_generate(ctx: &Context, args: PlanGenerateArgs, json_mode: bool) -> Result<()> {
    // Concrete provider HTTP clients are out of scope here; the CLI
    // exercises the generator against a fixture response so the pipeline is
    // reachable without a live model.
    let provider = match &args.stub_response {
        Some(path) => NullProvider::with_json(fs::read_to_string(path)?),
        None => NullProvider::with_json(json!({"files": []}).to_string()),
    };

    let result = generate_and_persist(
        &ctx.plans,
        &provider,
        &args.model,
        &args.goal,
        &args.provider,
        &ctx.config.plan,
        args.allow_website_scaffold || ctx.config.git.allow_heuristic_website_scaffold,
    );

    let record = match result {
        Ok(record) => record,
        Err(err) => {
            print_error("plan.generate.ai.v1", err.code(), &err.to_string(), json_mode)?;
            return Err(plan_error_to_anyhow(err));
        }
    };

    let generation = record.generation.as_ref().expect("generate_and_persist always sets generation");
    let truncated = record
        .files
        .iter()
        .any(|f| f.diagnostics.contains(&codepunk_core::Diagnostic::TruncatedAggregate));

    if json_mode {
        print_json(&json!({
            "schema": "plan.generate.ai.v1",
            "planId": record.definition.id,
            "goal": record.definition.goal,
            "provider": generation.provider,
            "model": generation.model,
            "changeCount": record.files.len(),
            "files": record.files.iter().map(|f| json!({
                "path": f.path,
                "action": if f.is_delete { "delete" } else { "modify" },
                "rationale": f.rationale,
                "generated": f.generated,
                "diagnostics": f.diagnostics,
            })).collect::<Vec<_>>(),
            "tokenUsage": json!({
                "prompt": generation.prompt_tokens,
                "completion": generation.completion_tokens,
                "total": generation.total_tokens,
            }),
            "iterations": generation.iterations,
            "safetyFlags": generation.safety_flags,
            "truncated": truncated,
        }))?;
    } else {
        println!(
            "generated plan {} ({} file(s), {} iteration(s))",
            record.definition.id,
            record.files.len(),
            generation.iterations
        );
    }
    Ok(())
}

fn plan_error_to_anyhow(err: PlanError) -> anyhow::Error {
    anyhow::Error::new(err)
}
