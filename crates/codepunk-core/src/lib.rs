//! Shared data model and configuration for CodePunk's plan engine and git
//! session workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod atomic;
pub mod config_root;

pub use atomic::atomic_write;
pub use config_root::config_root;

/// A persisted, auditable intent to change a set of files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDefinition {
    /// Lexicographically sortable: `yyyyMMddHHmmss-<6 hex chars>`.
    pub id: String,
    pub goal: String,
    pub created_utc: DateTime<Utc>,
}

/// Diagnostics the safety gate (C6) may attach to a staged change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Diagnostic {
    UnsafePath,
    SecretRedacted,
    TruncatedContent,
    TruncatedAggregate,
}

/// One file entry in a plan: a staged modification, deletion, or snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFileChange {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default)]
    pub is_delete: bool,
    #[serde(default)]
    pub generated: bool,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl PlanFileChange {
    pub fn new_stage(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            before_content: None,
            after_content: None,
            hash_before: None,
            hash_after: None,
            diff: None,
            rationale: None,
            is_delete: false,
            generated: false,
            diagnostics: Vec::new(),
        }
    }
}

/// Token-usage estimate attached to summaries and generation metadata.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsageApprox {
    pub sample_chars: u64,
    pub approx_tokens: u64,
}

/// Present when a plan was derived from a session transcript (C13).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub source: String,
    pub goal: String,
    pub candidate_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub used_messages: u64,
    pub total_messages: u64,
    pub truncated: bool,
    pub token_usage: TokenUsageApprox,
}

/// Present only on the AI-driven generation path (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanGeneration {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    pub iterations: u32,
    pub safety_flags: Vec<Diagnostic>,
    pub created_utc: DateTime<Utc>,
}

/// The persisted unit the Plan Store (C4) owns on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    pub definition: PlanDefinition,
    #[serde(default)]
    pub files: Vec<PlanFileChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PlanSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<PlanGeneration>,
}

impl PlanRecord {
    pub fn new(id: String, goal: String) -> Self {
        Self {
            definition: PlanDefinition {
                id,
                goal,
                created_utc: Utc::now(),
            },
            files: Vec::new(),
            summary: None,
            generation: None,
        }
    }
}

/// One per-tool-call commit recorded on the session's shadow branch (C10/C11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitToolCallCommit {
    pub tool_name: String,
    pub commit_hash: String,
    pub committed_at: DateTime<Utc>,
    pub files_changed: Vec<String>,
}

/// Persisted state of one AI session workspace (C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitSessionState {
    pub session_id: String,
    pub shadow_branch: String,
    pub original_branch: String,
    pub worktree_path: PathBuf,
    #[serde(default)]
    pub tool_call_commits: Vec<GitToolCallCommit>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// A cached prompt-cache eligibility entry (C14).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptCacheEntry {
    pub key: String,
    pub provider_supports_cache: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_cache_info: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PromptCacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

// ---------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------

/// Plan safety gate tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyGateConfig {
    pub max_files: u64,
    pub max_path_length: u64,
    pub max_per_file_bytes: u64,
    pub max_total_bytes: u64,
    pub retry_invalid_output: u32,
    pub secret_patterns: Vec<String>,
    pub max_model_output_bytes: u64,
}

impl Default for SafetyGateConfig {
    fn default() -> Self {
        Self {
            max_files: 20,
            max_path_length: 260,
            max_per_file_bytes: 16384,
            max_total_bytes: 131072,
            retry_invalid_output: 1,
            secret_patterns: vec![
                "API_KEY=".to_string(),
                "SECRET=".to_string(),
                "PASSWORD=".to_string(),
                "-----BEGIN".to_string(),
            ],
            max_model_output_bytes: 262144,
        }
    }
}

/// Git session workspace tunables (C8–C12 config surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitWorkflowConfig {
    pub worktree_base: Option<PathBuf>,
    pub shadow_branch_prefix: String,
    pub session_timeout_minutes: u64,
    pub auto_revert_on_timeout: bool,
    pub keep_failed_session_branches: bool,
    /// Heuristic website-scaffold fallback for the AI plan generator: opt-in, default off.
    pub allow_heuristic_website_scaffold: bool,
}

impl Default for GitWorkflowConfig {
    fn default() -> Self {
        Self {
            worktree_base: None,
            shadow_branch_prefix: "ai/session".to_string(),
            session_timeout_minutes: 60,
            auto_revert_on_timeout: false,
            keep_failed_session_branches: false,
            allow_heuristic_website_scaffold: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub enabled: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub plan: SafetyGateConfig,
    pub git: GitWorkflowConfig,
    pub sessions: SessionsConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plan: SafetyGateConfig::default(),
            git: GitWorkflowConfig::default(),
            sessions: SessionsConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(config_root()?.join("config.toml"))
    }

    /// Load `config.toml`, defaulting any field absent from the file.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        let raw = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load if present, else construct and persist defaults.
    pub fn ensure() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            return Self::load();
        }
        let cfg = Self::default();
        cfg.save()?;
        Ok(cfg)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        atomic_write(&path, rendered.as_bytes())
    }
}

/// Runtime directory for a crate's own state, nested under a workspace.
/// Mirrors the `runtime_dir(workspace)` convention used elsewhere in this
/// codebase for per-workspace scratch state.
pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".codepunk")
}
