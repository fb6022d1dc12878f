use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMeta {
    pub name: String,
    pub description: String,
}

impl Default for ProjectMeta {
    fn default() -> Self {
        Self {
            name: "New Project".to_string(),
            description: String::new(),
        }
    }
}
