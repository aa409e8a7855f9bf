use std::fs;
use std::path::Path;

use serde_json::{json, Value as JsonValue};
use sitecheck_lib::config::AppConfig;
use sitecheck_lib::error::AppError;
use sitecheck_lib::models::category::{ACTIVITY_CATALOG, COMBINED_FIRST_FIX};
use sitecheck_lib::models::report::ReconciliationRow;
use sitecheck_lib::run_offline;
use tempfile::tempdir;

const GREEN: &str = "FF92D050";

fn config_yaml(output_dir: &Path, format: &str) -> String {
    format!(
        r#"
datasets:
  - name: ews-finishing
    plan_id: "Q-1"
    kind: finishing
tracker:
  sheet: Tracker
  ignore: {{ year: 2000, month: 1 }}
  ranges:
    - tower: EWS Tower 1
      activity: Concreting
      rows: [2, 4]
      columns: [2, 2]
    - tower: EWS Tower 1
      activity: Wall Conducting
      rows: [2, 4]
      columns: [3, 3]
    - tower: EWS Tower 1
      activity: UP-First Fix
      rows: [2, 4]
      columns: [4, 4]
    - tower: EWS Tower 1
      activity: CP-First Fix
      rows: [2, 4]
      columns: [5, 5]
report:
  output_dir: "{}"
  format: {format}
workers: 2
"#,
        output_dir.display()
    )
}

fn snapshot() -> JsonValue {
    json!({
        "datasets": [{
            "name": "ews-finishing",
            "kind": "finishing",
            "locations": { "locationList": [
                { "qiLocationId": 1, "qiParentId": null, "name": "Quality" },
                { "qiLocationId": 2, "qiParentId": 1, "name": "EWS Tower-1" },
                { "qiLocationId": 3, "qiParentId": 2, "name": "101" },
                { "qiLocationId": 4, "qiParentId": 2, "name": "102" },
                { "qiLocationId": 5, "qiParentId": 2, "name": "Common Lobby" }
            ] },
            "activities": [
                { "activitySeq": 1, "activityName": "Wall Conduting", "formTypeId": 10 },
                { "activitySeq": 2, "activityName": "Concreting", "formTypeId": 11 },
                { "activitySeq": 3, "activityName": "UP-First Fix", "formTypeId": 12 },
                { "activitySeq": 4, "activityName": "CP-First Fix", "formTypeId": 12 }
            ],
            "associations": { "associationList": [
                { "qiLocationId": 3, "activitySeq": 1, "statusName": "Completed" },
                { "qiLocationId": 3, "activitySeq": 1, "statusColor": "#4CAF50" },
                { "qiLocationId": 4, "activitySeq": 1, "statusName": "Completed" },
                { "qiLocationId": 5, "activitySeq": 1, "statusName": "Completed" },
                { "qiLocationId": 3, "activitySeq": 2, "statusName": "Completed" },
                { "qiLocationId": 4, "activitySeq": 2, "statusColor": "#9E9E9E" },
                { "qiLocationId": 3, "activitySeq": 3, "statusName": "Completed" },
                { "qiLocationId": 4, "activitySeq": 3, "statusName": "Completed" },
                { "qiLocationId": 3, "activitySeq": 4, "statusName": "Completed" }
            ] }
        }]
    })
}

fn tracker() -> JsonValue {
    let mut cells = Vec::new();
    // column 2: Concreting, 3: Wall Conducting, 4: UP-First Fix, 5: CP-First Fix
    for (column, marked_rows) in [(2, vec![2, 3]), (3, vec![2, 3, 4]), (4, vec![2, 3, 4]), (5, vec![2, 3])] {
        for row in 2..=4 {
            let fill = if marked_rows.contains(&row) { GREEN } else { "FFFFFFFF" };
            cells.push(json!({ "row": row, "column": column, "value": "2024-11-05", "fill": fill }));
        }
    }
    json!({ "sheets": [{ "name": "Tracker", "cells": cells }] })
}

fn row<'a>(rows: &'a [ReconciliationRow], activity: &str) -> &'a ReconciliationRow {
    rows.iter()
        .find(|row| row.tower == "EWS Tower 1" && row.activity_name == activity)
        .expect("reconciliation row")
}

fn write_inputs(dir: &Path, format: &str) -> (AppConfig, std::path::PathBuf, std::path::PathBuf) {
    let output_dir = dir.join("reports");
    let config = AppConfig::from_yaml(&config_yaml(&output_dir, format)).expect("config parses");
    config.validate().expect("config valid");

    let snapshot_path = dir.join("snapshot.json");
    fs::write(&snapshot_path, snapshot().to_string()).expect("snapshot written");
    let tracker_path = dir.join("tracker_05-11-2024.json");
    fs::write(&tracker_path, tracker().to_string()).expect("tracker written");
    (config, snapshot_path, tracker_path)
}

#[tokio::test]
async fn offline_snapshot_produces_reconciled_report() {
    let dir = tempdir().expect("temp dir");
    let (config, snapshot_path, tracker_path) = write_inputs(dir.path(), "json");

    let outcome = run_offline(config, &snapshot_path, Some(tracker_path.as_path()))
        .await
        .expect("offline run succeeds");

    assert!(outcome.failed_datasets.is_empty());
    assert_eq!(outcome.rows.len(), ACTIVITY_CATALOG.len());

    let wall = row(&outcome.rows, "Wall Conducting");
    assert_eq!(wall.completed_work, 3);
    assert_eq!(wall.closed_checklist, 2);
    assert_eq!(wall.open_missing, 1);

    let concreting = row(&outcome.rows, "Concreting");
    assert_eq!(concreting.completed_work, 2);
    assert_eq!(concreting.closed_checklist, 1);
    assert_eq!(concreting.open_missing, 1);

    let combined = row(&outcome.rows, COMBINED_FIRST_FIX);
    assert_eq!(combined.completed_work, 2);
    assert_eq!(combined.closed_checklist, 1);
    assert_eq!(combined.open_missing, 1);

    let plastering = row(&outcome.rows, "Plastering");
    assert_eq!(plastering.open_missing, 0);

    let file_name = outcome
        .report_path
        .file_name()
        .and_then(|name| name.to_str())
        .expect("report file name");
    assert!(file_name.starts_with("consolidated-checklist-"));
    assert!(file_name.ends_with(".json"));

    let report: JsonValue =
        serde_json::from_str(&fs::read_to_string(&outcome.report_path).expect("report readable"))
            .expect("report is JSON");
    let sheets = report["sheets"].as_array().expect("sheets");
    assert_eq!(sheets.len(), 2);
    assert_eq!(sheets[0]["name"], "Consolidated Checklist");
    assert_eq!(
        sheets[0]["tables"][0]["headers"],
        json!(["Activity Name", "Completed", "In progress", "Closed checklist", "Open/Missing check list"])
    );
    assert_eq!(
        sheets[1]["tables"][0]["headers"],
        json!(["Site", "Total Missing/Open-Civil", "Total Missing/Open-MEP", "TOTAL"])
    );
    let site_row = &sheets[1]["tables"][0]["rows"][0]["cells"];
    assert_eq!(site_row[0], "EWS Tower 1");
    assert_eq!(site_row[1], 1);
    assert_eq!(site_row[2], 2);
    assert_eq!(site_row[3], 3);
}

#[tokio::test]
async fn markdown_reports_and_missing_tracker_suppress_gaps() {
    let dir = tempdir().expect("temp dir");
    let (config, snapshot_path, _) = write_inputs(dir.path(), "markdown");

    let outcome = run_offline(config, &snapshot_path, None)
        .await
        .expect("offline run succeeds");

    assert!(outcome.rows.iter().all(|row| row.completed_work == 0));
    assert!(outcome.rows.iter().all(|row| row.open_missing == 0));
    assert_eq!(row(&outcome.rows, "Wall Conducting").closed_checklist, 2);

    let content = fs::read_to_string(&outcome.report_path).expect("markdown readable");
    assert!(content.contains("## Consolidated Checklist"));
    assert!(content.contains("### EWS Tower 1 Civil Works"));
    assert!(content.contains("Total pending check list"));
}

#[tokio::test]
async fn schema_mismatch_halts_without_report() {
    let dir = tempdir().expect("temp dir");
    let (config, snapshot_path, tracker_path) = write_inputs(dir.path(), "json");

    let mut broken = snapshot();
    broken["datasets"][0]["associations"] = json!([{ "qiLocationId": 3, "statusName": "Completed" }]);
    fs::write(&snapshot_path, broken.to_string()).expect("snapshot rewritten");

    let error = run_offline(config, &snapshot_path, Some(tracker_path.as_path()))
        .await
        .expect_err("schema mismatch");
    match error {
        AppError::SchemaMismatch { dataset, missing } => {
            assert_eq!(dataset, "ews-finishing/associations");
            assert_eq!(missing, vec!["activitySeq".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!dir.path().join("reports").exists());
}
