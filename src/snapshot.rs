use crate::layout::Lane;
use crate::metadata::ProjectMeta;
use crate::task::Task;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable snapshot of the full planner state: the unit of
/// import/export. Every field defaults so partially-malformed saved data
/// still deserializes; the repair pass straightens out the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSnapshot {
    pub meta: ProjectMeta,
    pub tasks: Vec<Task>,
    pub lanes: Vec<Lane>,
    pub trade_filter: BTreeMap<String, bool>,
}
