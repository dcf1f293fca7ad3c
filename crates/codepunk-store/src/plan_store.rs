use codepunk_core::{atomic_write, PlanDefinition, PlanRecord};
use std::path::{Path, PathBuf};

/// Layout under `<config-root>/plans/`:
/// `index.json`, `<planId>.json`, `backups/<planId>-<ts>/`.
pub struct PlanStore {
    plans_dir: PathBuf,
}

impl PlanStore {
    pub fn new(config_root: &Path) -> Self {
        Self {
            plans_dir: config_root.join("plans"),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.plans_dir.join("index.json")
    }

    fn record_path(&self, plan_id: &str) -> PathBuf {
        self.plans_dir.join(format!("{plan_id}.json"))
    }

    /// Directory for one apply run's backups.
    pub fn backup_dir(&self, plan_id: &str, ts: &str) -> PathBuf {
        self.plans_dir.join("backups").join(format!("{plan_id}-{ts}"))
    }

    /// `yyyyMMddHHmmss-<6 hex chars>`: chronological sort, collision-free
    /// within one second per process.
    pub fn generate_id() -> String {
        let ts = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let suffix: u32 = rand::random::<u32>() & 0xFF_FFFF;
        format!("{ts}-{suffix:06x}")
    }

    pub fn create(&self, goal: impl Into<String>) -> anyhow::Result<PlanRecord> {
        let record = PlanRecord::new(Self::generate_id(), goal.into());
        self.save(&record)?;
        Ok(record)
    }

    pub fn load(&self, plan_id: &str) -> anyhow::Result<PlanRecord> {
        let raw = std::fs::read_to_string(self.record_path(plan_id))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, record: &PlanRecord) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.plans_dir)?;
        let rendered = serde_json::to_string_pretty(record)?;
        atomic_write(&self.record_path(&record.definition.id), rendered.as_bytes())?;
        self.upsert_index(&record.definition)
    }

    fn upsert_index(&self, def: &PlanDefinition) -> anyhow::Result<()> {
        let mut defs = self.list()?;
        match defs.iter_mut().find(|d| d.id == def.id) {
            Some(existing) => *existing = def.clone(),
            None => defs.push(def.clone()),
        }
        let rendered = serde_json::to_string_pretty(&defs)?;
        atomic_write(&self.index_path(), rendered.as_bytes())
    }

    /// The plan index, reconstructed from `*.json` records if `index.json`
    /// is missing or unparseable.
    pub fn list(&self) -> anyhow::Result<Vec<PlanDefinition>> {
        if let Ok(raw) = std::fs::read_to_string(self.index_path()) {
            if let Ok(defs) = serde_json::from_str::<Vec<PlanDefinition>>(&raw) {
                return Ok(defs);
            }
        }
        self.reconstruct_index()
    }

    fn reconstruct_index(&self) -> anyhow::Result<Vec<PlanDefinition>> {
        let mut defs = Vec::new();
        if !self.plans_dir.exists() {
            return Ok(defs);
        }
        for entry in std::fs::read_dir(&self.plans_dir)? {
            let path = entry?.path();
            if path.file_name().and_then(|n| n.to_str()) == Some("index.json") {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(raw) = std::fs::read_to_string(&path) {
                if let Ok(record) = serde_json::from_str::<PlanRecord>(&raw) {
                    defs.push(record.definition);
                }
            }
        }
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(defs)
    }
}
