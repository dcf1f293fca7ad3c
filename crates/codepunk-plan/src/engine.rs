//! Plan Engine (C5).
//!
//! Stages file changes onto a [`PlanRecord`] and applies them back to disk
//! with drift detection and per-run backups. A per-file error never aborts
//! the run — every file is processed and its outcome reported.

use crate::errors::PlanError;
use codepunk_core::{Diagnostic, PlanFileChange, PlanRecord};
use codepunk_diff::{content_hash, deletion_diff, unified_diff};
use codepunk_store::PlanStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub struct PlanEngine<'a> {
    store: &'a PlanStore,
    workspace: PathBuf,
}

/// Per-file apply outcome — no other values are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyAction {
    Applied,
    SkippedDrift,
    SkipMissing,
    Deleted,
    DeleteError,
    DryRun,
    DryRunDelete,
    SkippedError,
    /// A snapshot-only stage entry (no `afterContent`, not a delete):
    /// informational, never modifies disk.
    Snapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFileOutcome {
    pub path: String,
    pub action: ApplyAction,
    pub had_drift: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ApplySummary {
    pub applied: u64,
    pub skipped: u64,
    pub drift: u64,
    pub backed_up: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub summary: ApplySummary,
    pub per_file: Vec<PlanFileOutcome>,
}

impl<'a> PlanEngine<'a> {
    pub fn new(store: &'a PlanStore, workspace: PathBuf) -> Self {
        Self { store, workspace }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.workspace.join(path)
    }

    pub fn create(&self, goal: impl Into<String>) -> Result<PlanRecord, PlanError> {
        self.store.create(goal).map_err(PlanError::Other)
    }

    /// Stages one file change into the plan.
    pub fn stage(
        &self,
        plan_id: &str,
        path: &str,
        after_content: Option<String>,
        is_delete: bool,
        rationale: Option<String>,
    ) -> Result<PlanRecord, PlanError> {
        let mut record = self.load(plan_id)?;
        let disk_path = self.resolve(path);
        let mut entry = PlanFileChange::new_stage(path);
        entry.rationale = rationale;

        if is_delete {
            if let Ok(before) = std::fs::read_to_string(&disk_path) {
                entry.hash_before = Some(content_hash(&before));
                entry.diff = Some(deletion_diff(path, &before));
                entry.before_content = Some(before);
            }
            entry.is_delete = true;
        } else if let Some(after) = after_content {
            let before = std::fs::read_to_string(&disk_path).unwrap_or_default();
            entry.hash_before = Some(content_hash(&before));
            entry.hash_after = Some(content_hash(&after));
            entry.diff = Some(unified_diff(path, &before, &after));
            entry.before_content = Some(before);
            entry.after_content = Some(after);
        } else if let Ok(before) = std::fs::read_to_string(&disk_path) {
            entry.hash_before = Some(content_hash(&before));
            entry.before_content = Some(before);
        }

        record.files.push(entry);
        self.store.save(&record).map_err(PlanError::Other)?;
        Ok(record)
    }

    /// Per-file diff strings.
    pub fn diff(&self, plan_id: &str) -> Result<Vec<(String, Option<String>)>, PlanError> {
        let record = self.load(plan_id)?;
        Ok(record
            .files
            .iter()
            .map(|f| (f.path.clone(), f.diff.clone()))
            .collect())
    }

    fn load(&self, plan_id: &str) -> Result<PlanRecord, PlanError> {
        self.store
            .load(plan_id)
            .map_err(|_| PlanError::PlanNotFound(plan_id.to_string()))
    }

    /// Apply algorithm: processes every file in stored order; a per-file I/O
    /// error is recorded as an outcome, never propagated. The backup
    /// directory is created lazily on the first modifying operation so a
    /// pure dry run leaves no empty directory.
    pub fn apply(&self, plan_id: &str, dry_run: bool, force: bool) -> Result<ApplyReport, PlanError> {
        let record = self.load(plan_id)?;
        let ts = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
        let backup_dir = self.store.backup_dir(plan_id, &ts);
        let mut backup_dir_created = false;

        let mut summary = ApplySummary::default();
        let mut per_file = Vec::with_capacity(record.files.len());

        for file in &record.files {
            let outcome = self.apply_one(file, dry_run, force, &backup_dir, &mut backup_dir_created);
            tally(&mut summary, &outcome);
            per_file.push(outcome);
        }

        Ok(ApplyReport { summary, per_file })
    }

    fn apply_one(
        &self,
        file: &PlanFileChange,
        dry_run: bool,
        force: bool,
        backup_dir: &Path,
        backup_dir_created: &mut bool,
    ) -> PlanFileOutcome {
        // apply MUST refuse entries flagged UnsafePath, regardless of
        // dry-run/force — the entry stays in the record for visibility but
        // never touches disk.
        if file.diagnostics.contains(&Diagnostic::UnsafePath) {
            return PlanFileOutcome {
                path: file.path.clone(),
                action: ApplyAction::SkippedError,
                had_drift: false,
                backup_path: None,
            };
        }

        let disk_path = self.resolve(&file.path);
        let current = std::fs::read_to_string(&disk_path).ok();
        let current_hash = current.as_deref().map(content_hash);
        let had_drift = match (&file.hash_before, &current_hash) {
            (Some(expected), Some(actual)) => expected != actual,
            (Some(_), None) => true,
            _ => false,
        };

        if had_drift && !force {
            return PlanFileOutcome {
                path: file.path.clone(),
                action: ApplyAction::SkippedDrift,
                had_drift: true,
                backup_path: None,
            };
        }

        if file.is_delete {
            return self.apply_delete(file, &disk_path, current.as_ref(), dry_run, had_drift, backup_dir, backup_dir_created);
        }

        if file.after_content.is_some() {
            return self.apply_write(file, &disk_path, dry_run, had_drift, backup_dir, backup_dir_created);
        }

        PlanFileOutcome {
            path: file.path.clone(),
            action: ApplyAction::Snapshot,
            had_drift,
            backup_path: None,
        }
    }

    fn apply_delete(
        &self,
        file: &PlanFileChange,
        disk_path: &Path,
        current: Option<&String>,
        dry_run: bool,
        had_drift: bool,
        backup_dir: &Path,
        backup_dir_created: &mut bool,
    ) -> PlanFileOutcome {
        if dry_run {
            return PlanFileOutcome {
                path: file.path.clone(),
                action: ApplyAction::DryRunDelete,
                had_drift,
                backup_path: None,
            };
        }
        if current.is_none() {
            return PlanFileOutcome {
                path: file.path.clone(),
                action: ApplyAction::SkipMissing,
                had_drift,
                backup_path: None,
            };
        }

        let backup_path = backup_dir.join(&file.path);
        if self.backup(backup_dir, backup_dir_created, &backup_path, current).is_err() {
            return PlanFileOutcome {
                path: file.path.clone(),
                action: ApplyAction::DeleteError,
                had_drift,
                backup_path: None,
            };
        }
        match std::fs::remove_file(disk_path) {
            Ok(()) => PlanFileOutcome {
                path: file.path.clone(),
                action: ApplyAction::Deleted,
                had_drift,
                backup_path: Some(backup_path),
            },
            Err(_) => PlanFileOutcome {
                path: file.path.clone(),
                action: ApplyAction::DeleteError,
                had_drift,
                backup_path: Some(backup_path),
            },
        }
    }

    fn apply_write(
        &self,
        file: &PlanFileChange,
        disk_path: &Path,
        dry_run: bool,
        had_drift: bool,
        backup_dir: &Path,
        backup_dir_created: &mut bool,
    ) -> PlanFileOutcome {
        if dry_run {
            return PlanFileOutcome {
                path: file.path.clone(),
                action: ApplyAction::DryRun,
                had_drift,
                backup_path: None,
            };
        }

        let backup_path = backup_dir.join(&file.path);
        let existing = std::fs::read_to_string(disk_path).ok();
        if let Some(existing) = &existing {
            if self.backup(backup_dir, backup_dir_created, &backup_path, existing).is_err() {
                return PlanFileOutcome {
                    path: file.path.clone(),
                    action: ApplyAction::SkippedError,
                    had_drift,
                    backup_path: None,
                };
            }
        }

        let after = file.after_content.as_deref().unwrap_or_default();
        let write_result = disk_path
            .parent()
            .map(std::fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|()| std::fs::write(disk_path, after));

        match write_result {
            Ok(()) => PlanFileOutcome {
                path: file.path.clone(),
                action: ApplyAction::Applied,
                had_drift,
                backup_path: existing.map(|_| backup_path),
            },
            Err(_) => PlanFileOutcome {
                path: file.path.clone(),
                action: ApplyAction::SkippedError,
                had_drift,
                backup_path: None,
            },
        }
    }

    fn backup(
        &self,
        backup_dir: &Path,
        backup_dir_created: &mut bool,
        backup_path: &Path,
        content: &str,
    ) -> std::io::Result<()> {
        if !*backup_dir_created {
            std::fs::create_dir_all(backup_dir)?;
            *backup_dir_created = true;
        }
        if let Some(parent) = backup_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(backup_path, content)
    }
}

fn tally(summary: &mut ApplySummary, outcome: &PlanFileOutcome) {
    if outcome.had_drift {
        summary.drift += 1;
    }
    if outcome.backup_path.is_some() {
        summary.backed_up += 1;
    }
    match outcome.action {
        ApplyAction::Applied => summary.applied += 1,
        ApplyAction::SkippedDrift | ApplyAction::SkipMissing | ApplyAction::DeleteError | ApplyAction::SkippedError => {
            summary.skipped += 1
        }
        ApplyAction::DryRun | ApplyAction::DryRunDelete | ApplyAction::Snapshot | ApplyAction::Deleted => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, PlanStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn stage_without_after_content_is_snapshot_only() {
        let (dir, store) = setup();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let engine = PlanEngine::new(&store, dir.path().to_path_buf());
        let record = engine.create("test").unwrap();
        let staged = engine.stage(&record.definition.id, "a.txt", None, false, None).unwrap();
        assert_eq!(staged.files[0].before_content.as_deref(), Some("hello"));
        assert!(staged.files[0].after_content.is_none());
    }

    #[test]
    fn stage_with_after_content_builds_diff_and_hashes() {
        let (dir, store) = setup();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let engine = PlanEngine::new(&store, dir.path().to_path_buf());
        let record = engine.create("test").unwrap();
        let staged = engine
            .stage(&record.definition.id, "a.txt", Some("new".to_string()), false, None)
            .unwrap();
        assert!(staged.files[0].diff.as_ref().unwrap().contains("+new"));
        assert!(staged.files[0].hash_before.is_some());
        assert!(staged.files[0].hash_after.is_some());
    }

    #[test]
    fn apply_writes_after_content_and_backs_up_original() {
        let (dir, store) = setup();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let engine = PlanEngine::new(&store, dir.path().to_path_buf());
        let record = engine.create("test").unwrap();
        engine
            .stage(&record.definition.id, "a.txt", Some("new".to_string()), false, None)
            .unwrap();

        let report = engine.apply(&record.definition.id, false, false).unwrap();
        assert_eq!(report.summary.applied, 1);
        assert_eq!(report.summary.backed_up, 1);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");
        assert!(report.per_file[0].backup_path.as_ref().unwrap().exists());
    }

    #[test]
    fn apply_detects_drift_and_skips_without_force() {
        let (dir, store) = setup();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let engine = PlanEngine::new(&store, dir.path().to_path_buf());
        let record = engine.create("test").unwrap();
        engine
            .stage(&record.definition.id, "a.txt", Some("new".to_string()), false, None)
            .unwrap();

        std::fs::write(dir.path().join("a.txt"), "changed-out-from-under-us").unwrap();

        let report = engine.apply(&record.definition.id, false, false).unwrap();
        assert_eq!(report.summary.drift, 1);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.per_file[0].action, ApplyAction::SkippedDrift);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "changed-out-from-under-us"
        );
    }

    #[test]
    fn apply_with_force_applies_despite_drift() {
        let (dir, store) = setup();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let engine = PlanEngine::new(&store, dir.path().to_path_buf());
        let record = engine.create("test").unwrap();
        engine
            .stage(&record.definition.id, "a.txt", Some("new".to_string()), false, None)
            .unwrap();

        std::fs::write(dir.path().join("a.txt"), "changed-out-from-under-us").unwrap();

        let report = engine.apply(&record.definition.id, false, true).unwrap();
        assert_eq!(report.summary.applied, 1);
        assert_eq!(report.summary.drift, 1);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");
    }

    #[test]
    fn dry_run_never_touches_disk_or_creates_backup_dir() {
        let (dir, store) = setup();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let engine = PlanEngine::new(&store, dir.path().to_path_buf());
        let record = engine.create("test").unwrap();
        engine
            .stage(&record.definition.id, "a.txt", Some("new".to_string()), false, None)
            .unwrap();

        let report = engine.apply(&record.definition.id, true, false).unwrap();
        assert_eq!(report.per_file[0].action, ApplyAction::DryRun);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "old");
        assert!(!dir.path().join("plans/backups").exists());
    }

    #[test]
    fn apply_delete_backs_up_then_removes_file() {
        let (dir, store) = setup();
        std::fs::write(dir.path().join("a.txt"), "to-delete").unwrap();
        let engine = PlanEngine::new(&store, dir.path().to_path_buf());
        let record = engine.create("test").unwrap();
        engine.stage(&record.definition.id, "a.txt", None, true, None).unwrap();

        let report = engine.apply(&record.definition.id, false, false).unwrap();
        assert_eq!(report.per_file[0].action, ApplyAction::Deleted);
        assert!(!dir.path().join("a.txt").exists());
        assert!(report.per_file[0].backup_path.as_ref().unwrap().exists());
    }

    #[test]
    fn apply_counts_a_modify_and_a_delete_as_one_applied_two_backed_up() {
        let (dir, store) = setup();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        std::fs::write(dir.path().join("b.txt"), "to-delete").unwrap();
        let engine = PlanEngine::new(&store, dir.path().to_path_buf());
        let record = engine.create("test").unwrap();
        engine
            .stage(&record.definition.id, "a.txt", Some("new".to_string()), false, None)
            .unwrap();
        engine.stage(&record.definition.id, "b.txt", None, true, None).unwrap();

        let report = engine.apply(&record.definition.id, false, false).unwrap();
        assert_eq!(report.summary.applied, 1);
        assert_eq!(report.summary.skipped, 0);
        assert_eq!(report.summary.drift, 0);
        assert_eq!(report.summary.backed_up, 2);
    }

    #[test]
    fn apply_refuses_entries_flagged_unsafe_path() {
        let (dir, store) = setup();
        let engine = PlanEngine::new(&store, dir.path().to_path_buf());
        let record = engine.create("test").unwrap();
        let mut staged = engine
            .stage(&record.definition.id, "../outside.txt", Some("x".to_string()), false, None)
            .unwrap();
        staged.files[0].diagnostics.push(codepunk_core::Diagnostic::UnsafePath);
        store.save(&staged).unwrap();

        let report = engine.apply(&record.definition.id, false, true).unwrap();
        assert_eq!(report.per_file[0].action, ApplyAction::SkippedError);
        assert!(!dir.path().join("../outside.txt").exists());
    }

    #[test]
    fn apply_delete_on_missing_file_is_skip_missing() {
        let (dir, store) = setup();
        let engine = PlanEngine::new(&store, dir.path().to_path_buf());
        let record = engine.create("test").unwrap();
        engine.stage(&record.definition.id, "gone.txt", None, true, None).unwrap();

        let report = engine.apply(&record.definition.id, false, false).unwrap();
        assert_eq!(report.per_file[0].action, ApplyAction::SkipMissing);
        assert_eq!(report.summary.skipped, 1);
    }
}
