//! Plan Store (C4) and Git Session State persistence (C10).
//!
//! Both stores are plain JSON files under `<config-root>`, written with the
//! temp-file-then-rename discipline from [`codepunk_core::atomic_write`].

mod git_session_store;
mod plan_store;

pub use git_session_store::GitSessionStore;
pub use plan_store::PlanStore;
