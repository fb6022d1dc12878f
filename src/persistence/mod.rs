use serde_json::Error as SerdeJsonError;
use std::fmt;
use std::io;

use crate::snapshot::PlannerSnapshot;

#[derive(Debug)]
pub enum PersistenceError {
    Serialization(SerdeJsonError),
    Io(io::Error),
    InvalidData(String),
    NotFound,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Serialization(err) => write!(f, "serialization error: {err}"),
            PersistenceError::Io(err) => write!(f, "io error: {err}"),
            PersistenceError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            PersistenceError::NotFound => write!(f, "no planner state stored"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<SerdeJsonError> for PersistenceError {
    fn from(value: SerdeJsonError) -> Self {
        Self::Serialization(value)
    }
}

impl From<io::Error> for PersistenceError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Storage-medium abstraction. The engine exchanges snapshots; where they
/// live (file, database, browser storage) is the store's concern.
pub trait PlannerStore {
    fn save(&self, snapshot: &PlannerSnapshot) -> PersistenceResult<()>;
    fn load(&self) -> PersistenceResult<Option<PlannerSnapshot>>;
}

pub mod autosave;
pub mod file;

pub use autosave::Autosave;
pub use file::{JsonFileStore, load_snapshot_from_json, save_snapshot_to_json};
