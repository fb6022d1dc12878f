use super::{PersistenceResult, PlannerStore};
use crate::snapshot::PlannerSnapshot;
use std::fs::File;
use std::path::{Path, PathBuf};

pub fn save_snapshot_to_json<P: AsRef<Path>>(
    snapshot: &PlannerSnapshot,
    path: P,
) -> PersistenceResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<PlannerSnapshot> {
    let file = File::open(path)?;
    let snapshot: PlannerSnapshot = serde_json::from_reader(file)?;
    Ok(snapshot)
}

/// Snapshot store backed by a single JSON file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PlannerStore for JsonFileStore {
    fn save(&self, snapshot: &PlannerSnapshot) -> PersistenceResult<()> {
        save_snapshot_to_json(snapshot, &self.path)
    }

    fn load(&self) -> PersistenceResult<Option<PlannerSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        load_snapshot_from_json(&self.path).map(Some)
    }
}
