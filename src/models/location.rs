use serde::{Deserialize, Serialize};

/// One node of the project's location hierarchy as reported upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocationNode {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub name: String,
}

impl LocationNode {
    pub fn new(id: impl Into<String>, parent_id: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.map(str::to_string),
            name: name.into(),
        }
    }
}

/// Root-to-leaf path of a location together with the tower it belongs to.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPath {
    pub location_id: String,
    pub segments: Vec<String>,
    pub tower_label: String,
}

impl ResolvedPath {
    pub fn joined(&self) -> String {
        self.segments.join("/")
    }
}
