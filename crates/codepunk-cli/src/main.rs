//! `codepunk`: CLI surface over the Plan Engine and the AI Session workspace.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod context;
mod output;

use commands::{config, models, plan, session};
use context::{json_mode, Context};

#[derive(Parser)]
#[command(name = "codepunk")]
#[command(about = "CodePunk: plan engine and AI session workspace CLI", long_about = None)]
struct Cli {
    /// Suppress decorative output; emit exactly one JSON object
    /// (`CODEPUNK_QUIET=1` has the same effect).
    #[arg(long, global = true)]
    json: bool,

    /// Echo structured log events to stderr as they're recorded.
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Run against a workspace other than the current directory.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan Engine operations.
    Plan {
        #[command(subcommand)]
        command: PlanCommand,
    },
    /// AI Session workspace operations.
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Provider/model catalog.
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },
    /// Resolved `AppConfig`.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
}

#[derive(Subcommand)]
enum PlanCommand {
    Create(PlanCreateArgs),
    Add(PlanAddArgs),
    List,
    Show(PlanShowArgs),
    Diff(PlanDiffArgs),
    Apply(PlanApplyArgs),
    Generate(PlanGenerateArgs),
}

#[derive(Args)]
pub(crate) struct PlanCreateArgs {
    /// Free-text goal for a manually-staged plan.
    #[arg(long)]
    pub(crate) goal: Option<String>,
    /// Seed the plan from a prior session transcript (JSON array of
    /// `{role, text}`) instead of an explicit goal (C13).
    #[arg(long = "from-session")]
    pub(crate) from_session: Option<PathBuf>,
    #[arg(long = "max-messages")]
    pub(crate) max_messages: Option<usize>,
}

#[derive(Args)]
pub(crate) struct PlanAddArgs {
    pub(crate) plan_id: String,
    pub(crate) path: String,
    /// File whose contents become the staged `afterContent`.
    #[arg(long = "after-file")]
    pub(crate) after_file: Option<PathBuf>,
    #[arg(long)]
    pub(crate) delete: bool,
    #[arg(long)]
    pub(crate) rationale: Option<String>,
}

#[derive(Args)]
pub(crate) struct PlanShowArgs {
    pub(crate) plan_id: String,
}

#[derive(Args)]
pub(crate) struct PlanDiffArgs {
    pub(crate) plan_id: String,
}

#[derive(Args)]
pub(crate) struct PlanApplyArgs {
    pub(crate) plan_id: String,
    #[arg(long = "dry-run")]
    pub(crate) dry_run: bool,
    #[arg(long)]
    pub(crate) force: bool,
}

#[derive(Args)]
pub(crate) struct PlanGenerateArgs {
    #[arg(long)]
    pub(crate) goal: String,
    #[arg(long, default_value = "stub")]
    pub(crate) provider: String,
    #[arg(long, default_value = "stub-model")]
    pub(crate) model: String,
    /// Path to a fixture JSON response, standing in for a real provider's
    /// output (provider HTTP clients are out of scope here).
    #[arg(long = "stub-response")]
    pub(crate) stub_response: Option<PathBuf>,
    #[arg(long = "allow-website-scaffold")]
    pub(crate) allow_website_scaffold: bool,
}

#[derive(Subcommand)]
enum SessionCommand {
    Begin,
    Accept(SessionAcceptArgs),
    Reject(SessionRejectArgs),
    Status(SessionStatusArgs),
    List,
    /// Startup orphan sweep (C12).
    Reap,
}

#[derive(Args)]
pub(crate) struct SessionAcceptArgs {
    pub(crate) session_id: String,
}

#[derive(Args)]
pub(crate) struct SessionRejectArgs {
    pub(crate) session_id: String,
    #[arg(long)]
    pub(crate) reason: Option<String>,
}

#[derive(Args)]
pub(crate) struct SessionStatusArgs {
    pub(crate) session_id: Option<String>,
}

#[derive(Subcommand)]
enum ModelsCommand {
    List,
}

fn main() {
    let cli = Cli::parse();
    let json = json_mode(cli.json);

    let ctx = match Context::load(cli.workspace, cli.verbose) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: failed to initialize: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = dispatch(&ctx, cli.command, json) {
        if !json {
            eprintln!("error: {err}");
        }
        std::process::exit(1);
    }
}

fn dispatch(ctx: &Context, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Plan { command } => match command {
            PlanCommand::Create(args) => plan::run_create(ctx, args, json),
            PlanCommand::Add(args) => plan::run_add(ctx, args, json),
            PlanCommand::List => plan::run_list(ctx, json),
            PlanCommand::Show(args) => plan::run_show(ctx, args, json),
            PlanCommand::Diff(args) => plan::run_diff(ctx, args, json),
            PlanCommand::Apply(args) => plan::run_apply(ctx, args, json),
            PlanCommand::Generate(args) => plan::run_generate(ctx, args, json),
        },
        Command::Session { command } => match command {
            SessionCommand::Begin => session::run_begin(ctx, json),
            SessionCommand::Accept(args) => session::run_accept(ctx, args, json),
            SessionCommand::Reject(args) => session::run_reject(ctx, args, json),
            SessionCommand::Status(args) => session::run_status(ctx, args, json),
            SessionCommand::List => session::run_list(ctx, json),
            SessionCommand::Reap => session::run_reap(ctx, json),
        },
        Command::Models { command } => match command {
            ModelsCommand::List => models::run_list(ctx, json),
        },
        Command::Config { command } => match command {
            ConfigCommand::Show => config::run_show(ctx, json),
        },
    }
}
