use std::collections::BTreeMap;

use serde_json::{json, Value as JsonValue};

use crate::models::category::{ConstructionCategory, ACTIVITY_CATALOG, COMBINED_FIRST_FIX, FIRST_FIX_COMPONENTS};

/// System prompt for bucketing tracker activity totals into construction
/// categories.
pub fn categorization_system_prompt() -> &'static str {
    r#"You are a construction progress analyst. You receive completed-work counts per activity
for a single tower and must group them into exactly four categories:
"Civil Works", "MEP Works", "Interior Finishing Works", "External Development Activities".
Respond with a JSON array only, no markdown, no commentary. Each element has the shape:
{"Category": string, "Activities": [{"ActivityName": string, "Total": integer}]}
Use the activity names exactly as given in the catalog. Include every catalog activity,
using 0 when no count is provided. For the activity
"Min. count of UP-First Fix and CP-First Fix" report the minimum of the
"UP-First Fix" and "CP-First Fix" counts.

Example response:
[
  {"Category": "Civil Works", "Activities": [{"ActivityName": "Concreting", "Total": 12}]},
  {"Category": "MEP Works", "Activities": [{"ActivityName": "EL-First Fix", "Total": 4}]}
]"#
}

/// User payload sent with [`categorization_system_prompt`].
pub fn build_categorization_payload(counts: &BTreeMap<String, u32>, tower: &str) -> JsonValue {
    let catalog: Vec<JsonValue> = ConstructionCategory::ALL
        .iter()
        .map(|category| {
            let activities: Vec<&str> = ACTIVITY_CATALOG
                .iter()
                .filter(|(owner, _)| owner == category)
                .map(|(_, name)| *name)
                .collect();
            json!({ "category": category.as_str(), "activities": activities })
        })
        .collect();

    let (first, second) = FIRST_FIX_COMPONENTS;
    json!({
        "operation": "categorizeActivities",
        "tower": tower,
        "counts": counts,
        "catalog": catalog,
        "rules": {
            "combined": {
                "activity": COMBINED_FIRST_FIX,
                "rule": "min",
                "components": [first, second],
            },
            "missingActivityTotal": 0,
        }
    })
}

/// JSON schema the categorizer reply must satisfy.
pub fn categorization_response_schema() -> JsonValue {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "required": ["Category", "Activities"],
            "properties": {
                "Category": { "type": "string" },
                "Activities": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["ActivityName", "Total"],
                        "properties": {
                            "ActivityName": { "type": "string" },
                            "Total": { "type": "integer", "minimum": 0 }
                        }
                    }
                }
            }
        }
    })
}
