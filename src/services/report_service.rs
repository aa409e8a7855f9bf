use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::category::{ConstructionCategory, ACTIVITY_CATALOG};
use crate::models::report::{
    ReconciliationRow, ReportCell, ReportExportResult, ReportFormat, ReportRow, ReportSheet,
    ReportTable, ReportWorkbook, RowKind,
};

pub const CONSOLIDATED_SHEET: &str = "Consolidated Checklist";
pub const SUMMARY_SHEET: &str = "Summary";
pub const TOTAL_PENDING_LABEL: &str = "Total pending check list";
pub const EXTERNAL_DEVELOPMENT_SITE: &str = "External Development";

pub const TOWER_TABLE_ROWS: usize = 5;
pub const EXTERNAL_TABLE_ROWS: usize = 8;

const REPORT_PREFIX: &str = "consolidated-checklist";

pub const CHECKLIST_HEADERS: [&str; 5] = [
    "Activity Name",
    "Completed",
    "In progress",
    "Closed checklist",
    "Open/Missing check list",
];

pub const SUMMARY_HEADERS: [&str; 4] = [
    "Site",
    "Total Missing/Open-Civil",
    "Total Missing/Open-MEP",
    "TOTAL",
];

const TOWER_CATEGORIES: [ConstructionCategory; 3] = [
    ConstructionCategory::Civil,
    ConstructionCategory::Mep,
    ConstructionCategory::InteriorFinishing,
];

/// Lays reconciliation rows out as the two-sheet report.
pub fn build_workbook(rows: &[ReconciliationRow]) -> ReportWorkbook {
    let towers: BTreeSet<&str> = rows.iter().map(|row| row.tower.as_str()).collect();

    let mut tables = Vec::new();
    for tower in &towers {
        for category in TOWER_CATEGORIES {
            let members: Vec<&ReconciliationRow> = rows
                .iter()
                .filter(|row| row.tower == *tower && row.category == category)
                .collect();
            tables.push(checklist_table(
                format!("{tower} {}", category.as_str()),
                members.iter().map(|row| activity_cells(row)).collect(),
                members.iter().map(|row| row.open_missing).sum(),
                TOWER_TABLE_ROWS,
            ));
        }
    }
    tables.push(external_development_table(rows));

    ReportWorkbook {
        generated_at: Utc::now().to_rfc3339(),
        sheets: vec![
            ReportSheet {
                name: CONSOLIDATED_SHEET.to_string(),
                tables,
            },
            ReportSheet {
                name: SUMMARY_SHEET.to_string(),
                tables: vec![summary_table(rows, &towers)],
            },
        ],
    }
}

fn activity_cells(row: &ReconciliationRow) -> Vec<ReportCell> {
    vec![
        ReportCell::text(row.activity_name.as_str()),
        ReportCell::Number(row.completed_work),
        ReportCell::Empty,
        ReportCell::Number(row.closed_checklist),
        ReportCell::Number(row.open_missing),
    ]
}

fn checklist_table(
    title: String,
    data: Vec<Vec<ReportCell>>,
    pending_total: u32,
    min_rows: usize,
) -> ReportTable {
    let padding = min_rows.saturating_sub(data.len());
    let mut rows: Vec<ReportRow> = data
        .into_iter()
        .map(|cells| ReportRow {
            kind: RowKind::Data,
            cells,
        })
        .collect();
    rows.extend((0..padding).map(|_| ReportRow {
        kind: RowKind::Padding,
        cells: vec![ReportCell::Empty; CHECKLIST_HEADERS.len()],
    }));
    rows.push(ReportRow {
        kind: RowKind::Total,
        cells: vec![
            ReportCell::text(TOTAL_PENDING_LABEL),
            ReportCell::Empty,
            ReportCell::Empty,
            ReportCell::Empty,
            ReportCell::Number(pending_total),
        ],
    });

    ReportTable {
        title,
        headers: CHECKLIST_HEADERS.iter().map(|header| header.to_string()).collect(),
        rows,
    }
}

/// Cross-tower table: external works are site-wide, so each activity is
/// summed over all towers.
fn external_development_table(rows: &[ReconciliationRow]) -> ReportTable {
    let mut sums: BTreeMap<&str, (u32, u32, u32)> = BTreeMap::new();
    for row in rows
        .iter()
        .filter(|row| row.category == ConstructionCategory::ExternalDevelopment)
    {
        let entry = sums.entry(row.activity_name.as_str()).or_default();
        entry.0 += row.completed_work;
        entry.1 += row.closed_checklist;
        entry.2 += row.open_missing;
    }

    let data: Vec<Vec<ReportCell>> = ACTIVITY_CATALOG
        .iter()
        .filter(|(category, _)| *category == ConstructionCategory::ExternalDevelopment)
        .filter_map(|(_, activity)| {
            sums.get(activity).map(|(completed, closed, open)| {
                vec![
                    ReportCell::text(*activity),
                    ReportCell::Number(*completed),
                    ReportCell::Empty,
                    ReportCell::Number(*closed),
                    ReportCell::Number(*open),
                ]
            })
        })
        .collect();
    let pending: u32 = sums.values().map(|(_, _, open)| open).sum();

    checklist_table(
        ConstructionCategory::ExternalDevelopment.as_str().to_string(),
        data,
        pending,
        EXTERNAL_TABLE_ROWS,
    )
}

fn open_missing_for(rows: &[ReconciliationRow], tower: &str, categories: &[ConstructionCategory]) -> u32 {
    rows.iter()
        .filter(|row| row.tower == tower && categories.contains(&row.category))
        .map(|row| row.open_missing)
        .sum()
}

/// Open/missing pivot per site. Interior finishing counts towards the civil
/// column.
fn summary_table(rows: &[ReconciliationRow], towers: &BTreeSet<&str>) -> ReportTable {
    let mut table_rows = Vec::new();
    let mut civil_total = 0;
    let mut mep_total = 0;

    for tower in towers {
        let civil = open_missing_for(
            rows,
            tower,
            &[ConstructionCategory::Civil, ConstructionCategory::InteriorFinishing],
        );
        let mep = open_missing_for(rows, tower, &[ConstructionCategory::Mep]);
        civil_total += civil;
        mep_total += mep;
        table_rows.push(summary_row(RowKind::Data, tower, civil, mep));
    }

    let external: u32 = rows
        .iter()
        .filter(|row| row.category == ConstructionCategory::ExternalDevelopment)
        .map(|row| row.open_missing)
        .sum();
    civil_total += external;
    table_rows.push(summary_row(RowKind::Data, EXTERNAL_DEVELOPMENT_SITE, external, 0));
    table_rows.push(summary_row(RowKind::Total, "TOTAL", civil_total, mep_total));

    ReportTable {
        title: "Open/Missing checklist by site".to_string(),
        headers: SUMMARY_HEADERS.iter().map(|header| header.to_string()).collect(),
        rows: table_rows,
    }
}

fn summary_row(kind: RowKind, site: &str, civil: u32, mep: u32) -> ReportRow {
    ReportRow {
        kind,
        cells: vec![
            ReportCell::text(site),
            ReportCell::Number(civil),
            ReportCell::Number(mep),
            ReportCell::Number(civil + mep),
        ],
    }
}

pub fn render_markdown_report(workbook: &ReportWorkbook) -> String {
    let mut content = String::new();
    content.push_str("# Consolidated Checklist Report\n\n");
    content.push_str(&format!("Generated at: {}\n\n", workbook.generated_at));

    for sheet in &workbook.sheets {
        content.push_str(&format!("## {}\n\n", sheet.name));
        for table in &sheet.tables {
            content.push_str(&format!("### {}\n\n", table.title));
            content.push_str(&format!("| {} |\n", table.headers.join(" | ")));
            content.push_str(&format!(
                "|{}\n",
                " --- |".repeat(table.headers.len())
            ));
            for row in &table.rows {
                let cells: Vec<String> = row
                    .cells
                    .iter()
                    .map(|cell| match (row.kind, cell) {
                        (RowKind::Total, ReportCell::Text(_) | ReportCell::Number(_)) => {
                            format!("**{}**", cell.render())
                        }
                        _ => cell.render(),
                    })
                    .collect();
                content.push_str(&format!("| {} |\n", cells.join(" | ")));
            }
            content.push('\n');
        }
    }
    content
}

/// Writes the workbook into `output_dir`. The file appears under its final
/// name only once fully written.
pub fn export_report(
    workbook: &ReportWorkbook,
    output_dir: &Path,
    format: ReportFormat,
) -> AppResult<ReportExportResult> {
    fs::create_dir_all(output_dir).map_err(|err| {
        AppError::report(format!(
            "cannot create report directory {}: {err}",
            output_dir.display()
        ))
    })?;

    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    let filename = format!("{REPORT_PREFIX}-{timestamp}.{}", format.file_extension());
    let path = output_dir.join(&filename);
    let temp_path = output_dir.join(format!(".{filename}.partial"));

    let content = match format {
        ReportFormat::Markdown => render_markdown_report(workbook),
        ReportFormat::Json => serde_json::to_string_pretty(workbook)
            .map_err(|err| AppError::report(format!("cannot serialize report: {err}")))?,
    };

    if let Err(err) = write_then_rename(&temp_path, &path, content.as_bytes()) {
        if temp_path.exists() {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!(
                    target: "app::report",
                    path = %temp_path.display(),
                    error = %cleanup,
                    "failed to remove partial report"
                );
            }
        }
        return Err(AppError::report(format!(
            "cannot write {}: {err}",
            path.display()
        )));
    }

    info!(target: "app::report", path = %path.display(), format = ?format, "report exported");
    Ok(ReportExportResult {
        file_path: path.to_string_lossy().to_string(),
        format,
        generated_at: workbook.generated_at.clone(),
    })
}

fn write_then_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp_path, path)
}
