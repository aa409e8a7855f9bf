use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::activity::{ActivityDefinition, CompletionRecord, CompletionStatus};
use crate::models::location::LocationNode;

pub const LOCATION_LIST: &str = "locationList";
pub const ACTIVITY_LIST: &str = "activityList";
pub const ASSOCIATION_LIST: &str = "associationList";

const LOCATION_COLUMNS: [&str; 2] = ["qiLocationId", "name"];
const ACTIVITY_COLUMNS: [&str; 2] = ["activitySeq", "activityName"];
const ASSOCIATION_COLUMNS: [&str; 2] = ["qiLocationId", "activitySeq"];
const STATUS_COLUMNS: [&str; 2] = ["statusName", "statusColor"];

/// Accepts a bare array or an object wrapping one under `wrapper`.
pub fn normalize_list(body: &JsonValue, wrapper: &str) -> Vec<JsonValue> {
    match body {
        JsonValue::Array(items) => items.clone(),
        JsonValue::Object(map) => match map.get(wrapper) {
            Some(JsonValue::Array(items)) => items.clone(),
            Some(JsonValue::Null) => Vec::new(),
            _ if map.is_empty() => Vec::new(),
            _ => {
                warn!(
                    target: "app::fetch",
                    wrapper,
                    keys = ?map.keys().collect::<Vec<_>>(),
                    "response object has no list field"
                );
                Vec::new()
            }
        },
        JsonValue::Null => Vec::new(),
        other => {
            warn!(target: "app::fetch", wrapper, kind = json_kind(other), "unexpected response body");
            Vec::new()
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Ids arrive as strings or numbers depending on the endpoint.
fn text_field(record: &Map<String, JsonValue>, key: &str) -> Option<String> {
    match record.get(key)? {
        JsonValue::String(value) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        JsonValue::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

fn ensure_columns(
    dataset: &str,
    records: &[JsonValue],
    required: &[&str],
    any_of: Option<&[&str]>,
) -> AppResult<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let Some(object) = first.as_object() else {
        return Err(AppError::schema_mismatch(
            dataset,
            required.iter().map(|column| column.to_string()).collect(),
        ));
    };

    let mut missing: Vec<String> = required
        .iter()
        .filter(|column| !object.contains_key(**column))
        .map(|column| column.to_string())
        .collect();
    if let Some(alternatives) = any_of {
        if !alternatives.iter().any(|column| object.contains_key(*column)) {
            missing.push(alternatives.join("|"));
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::schema_mismatch(dataset, missing))
    }
}

fn convert<T>(
    dataset: &str,
    records: &[JsonValue],
    mut parse: impl FnMut(&Map<String, JsonValue>) -> Option<T>,
) -> Vec<T> {
    let mut skipped = 0usize;
    let converted: Vec<T> = records
        .iter()
        .filter_map(|record| {
            let parsed = record.as_object().and_then(&mut parse);
            if parsed.is_none() {
                skipped += 1;
            }
            parsed
        })
        .collect();
    if skipped > 0 {
        warn!(target: "app::fetch", dataset, skipped, "skipped incomplete records");
    }
    debug!(target: "app::fetch", dataset, records = converted.len(), "records normalized");
    converted
}

pub fn parse_locations(dataset: &str, body: &JsonValue) -> AppResult<Vec<LocationNode>> {
    let records = normalize_list(body, LOCATION_LIST);
    ensure_columns(dataset, &records, &LOCATION_COLUMNS, None)?;
    Ok(convert(dataset, &records, |record| {
        Some(LocationNode {
            id: text_field(record, "qiLocationId")?,
            parent_id: text_field(record, "qiParentId"),
            name: text_field(record, "name")?,
        })
    }))
}

pub fn parse_activities(dataset: &str, body: &JsonValue) -> AppResult<Vec<ActivityDefinition>> {
    let records = normalize_list(body, ACTIVITY_LIST);
    ensure_columns(dataset, &records, &ACTIVITY_COLUMNS, None)?;
    Ok(convert(dataset, &records, |record| {
        Some(ActivityDefinition::new(
            text_field(record, "activitySeq")?,
            text_field(record, "activityName")?,
            text_field(record, "formTypeId").unwrap_or_default(),
        ))
    }))
}

pub fn parse_completions(dataset: &str, body: &JsonValue) -> AppResult<Vec<CompletionRecord>> {
    let records = normalize_list(body, ASSOCIATION_LIST);
    ensure_columns(dataset, &records, &ASSOCIATION_COLUMNS, Some(&STATUS_COLUMNS[..]))?;
    Ok(convert(dataset, &records, |record| {
        let status = match text_field(record, "statusName") {
            Some(name) => CompletionStatus::from_status_name(&name),
            None => text_field(record, "statusColor")
                .map(|color| CompletionStatus::from_color(&color))
                .unwrap_or(CompletionStatus::Unknown),
        };
        Some(CompletionRecord::new(
            text_field(record, "qiLocationId")?,
            text_field(record, "activitySeq")?,
            status,
        ))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrapped_and_bare_lists_normalize_alike() {
        let bare = json!([{ "qiLocationId": 1, "name": "Quality" }]);
        let wrapped = json!({ "locationList": [{ "qiLocationId": 1, "name": "Quality" }] });
        assert_eq!(normalize_list(&bare, LOCATION_LIST), normalize_list(&wrapped, LOCATION_LIST));
        assert!(normalize_list(&json!({ "other": [] }), LOCATION_LIST).is_empty());
        assert!(normalize_list(&json!("nope"), LOCATION_LIST).is_empty());
    }

    #[test]
    fn locations_accept_numeric_ids_and_null_parents() {
        let body = json!([
            { "qiLocationId": 1, "qiParentId": null, "name": "Quality" },
            { "qiLocationId": "2", "qiParentId": 1, "name": "Tower-F" }
        ]);
        let nodes = parse_locations("locations", &body).expect("locations parse");
        assert_eq!(nodes[0], LocationNode::new("1", None, "Quality"));
        assert_eq!(nodes[1], LocationNode::new("2", Some("1"), "Tower-F"));
    }

    #[test]
    fn missing_columns_are_a_schema_mismatch() {
        let body = json!({ "associationList": [{ "qiLocationId": 1 }] });
        let error = parse_completions("ews-finishing", &body).expect_err("schema mismatch");
        match error {
            AppError::SchemaMismatch { dataset, missing } => {
                assert_eq!(dataset, "ews-finishing");
                assert_eq!(missing, vec!["activitySeq", "statusName|statusColor"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn status_falls_back_to_color() {
        let body = json!([
            { "qiLocationId": 3, "activitySeq": 7, "statusColor": "#4caf50" },
            { "qiLocationId": 4, "activitySeq": 7, "statusColor": "#123456" },
            { "qiLocationId": 5, "activitySeq": 7, "statusName": "Completed" }
        ]);
        let records = parse_completions("ews", &body).expect("records");
        let statuses: Vec<_> = records.iter().map(|record| record.status).collect();
        assert_eq!(
            statuses,
            vec![
                CompletionStatus::Completed,
                CompletionStatus::Unknown,
                CompletionStatus::Completed
            ]
        );
    }

    #[test]
    fn activity_names_are_typo_corrected() {
        let body = json!({ "activityList": [{ "activitySeq": 1, "activityName": "Wall Conduting", "formTypeId": 9 }] });
        let activities = parse_activities("ews", &body).expect("activities");
        assert_eq!(activities[0].name, "Wall Conducting");
        assert_eq!(activities[0].form_type_id, "9");
    }
}
