//! Shared CLI plumbing: workspace/config-root resolution, one `Observer` per
//! invocation.

use anyhow::Result;
use codepunk_core::{config_root, AppConfig};
use codepunk_observe::Observer;
use codepunk_store::{GitSessionStore, PlanStore};
use std::path::PathBuf;

pub(crate) struct Context {
    pub workspace: PathBuf,
    pub config: AppConfig,
    pub plans: PlanStore,
    pub git_sessions: GitSessionStore,
    pub observer: Observer,
}

impl Context {
    pub(crate) fn load(workspace: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let workspace = match workspace {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let root = config_root()?;
        let config = AppConfig::ensure()?;
        let mut observer = Observer::new()?;
        observer.set_verbose(verbose);

        Ok(Self {
            workspace,
            config,
            plans: PlanStore::new(&root),
            git_sessions: GitSessionStore::new(&root),
            observer,
        })
    }
}

/// `CODEPUNK_QUIET=1` or `--json` suppresses decorative output.
pub(crate) fn json_mode(flag: bool) -> bool {
    flag || std::env::var("CODEPUNK_QUIET").as_deref() == Ok("1")
}
