use serde::{Deserialize, Serialize};

use crate::models::category::ConstructionCategory;

/// Gap between tracker-derived completed work and closed checklists.
///
/// Zero when there is no tracker data or when checklists already exceed the
/// completed work.
pub fn open_missing(completed_work: u32, closed_checklist: u32) -> u32 {
    if completed_work == 0 || closed_checklist > completed_work {
        0
    } else {
        completed_work - closed_checklist
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRow {
    pub tower: String,
    pub category: ConstructionCategory,
    pub activity_name: String,
    pub completed_work: u32,
    pub closed_checklist: u32,
    pub open_missing: u32,
}

impl ReconciliationRow {
    pub fn new(
        tower: impl Into<String>,
        category: ConstructionCategory,
        activity_name: impl Into<String>,
        completed_work: u32,
        closed_checklist: u32,
    ) -> Self {
        Self {
            tower: tower.into(),
            category,
            activity_name: activity_name.into(),
            completed_work,
            closed_checklist,
            open_missing: open_missing(completed_work, closed_checklist),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReportCell {
    Empty,
    Text(String),
    Number(u32),
}

impl ReportCell {
    pub fn text(value: impl Into<String>) -> Self {
        ReportCell::Text(value.into())
    }

    pub fn render(&self) -> String {
        match self {
            ReportCell::Empty => String::new(),
            ReportCell::Text(value) => value.clone(),
            ReportCell::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Data,
    Padding,
    Total,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReportRow {
    pub kind: RowKind,
    pub cells: Vec<ReportCell>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn data_rows(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(|row| row.kind != RowKind::Total)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReportSheet {
    pub name: String,
    pub tables: Vec<ReportTable>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportWorkbook {
    pub generated_at: String,
    pub sheets: Vec<ReportSheet>,
}

impl ReportWorkbook {
    pub fn sheet(&self, name: &str) -> Option<&ReportSheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
        }
    }
}

impl Default for ReportFormat {
    fn default() -> Self {
        ReportFormat::Json
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExportResult {
    pub file_path: String,
    pub format: ReportFormat,
    pub generated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_is_suppressed_without_tracker_data_or_on_surplus() {
        assert_eq!(open_missing(0, 5), 0);
        assert_eq!(open_missing(10, 3), 7);
        assert_eq!(open_missing(3, 10), 0);
        assert_eq!(open_missing(4, 4), 0);
    }
}
