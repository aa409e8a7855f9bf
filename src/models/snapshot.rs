use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::checklist::DatasetKind;

/// Raw upstream bodies for one dataset, as captured from the document
/// service. Each body may be a bare list or an object wrapping one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSnapshot {
    pub name: String,
    #[serde(default)]
    pub kind: DatasetKind,
    #[serde(default)]
    pub locations: JsonValue,
    #[serde(default)]
    pub activities: JsonValue,
    #[serde(default)]
    pub associations: JsonValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamSnapshot {
    #[serde(default)]
    pub datasets: Vec<DatasetSnapshot>,
}
