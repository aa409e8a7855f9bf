use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TrackerCellValue {
    Number(f64),
    Text(String),
}

impl TrackerCellValue {
    /// Interprets the value as a date: ISO or day-first text, or an Excel
    /// serial day number.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            TrackerCellValue::Number(serial) => excel_serial_to_date(*serial),
            TrackerCellValue::Text(text) => parse_text_date(text),
        }
    }
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    // Plausible range: 1954-10-03 .. 2119-01-03
    if !(20_000.0..=80_000.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

static ISO_DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-").expect("iso date prefix pattern"));

fn parse_text_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    let date_part = trimmed.split_whitespace().next().unwrap_or(trimmed);
    // only ISO dates carry a `T` time suffix; month names may contain a T
    let date_part = if ISO_DATE_PREFIX.is_match(date_part) {
        date_part.split_once('T').map_or(date_part, |(date, _)| date)
    } else {
        date_part
    };
    const FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%d-%b-%Y", "%d-%b-%y"];
    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerCell {
    pub row: u32,
    pub column: u32,
    #[serde(default)]
    pub value: Option<TrackerCellValue>,
    /// ARGB or RGB hex of the cell fill, if any.
    #[serde(default)]
    pub fill: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerSheet {
    pub name: String,
    #[serde(default)]
    pub cells: Vec<TrackerCell>,
}

impl TrackerSheet {
    pub fn index(&self) -> HashMap<(u32, u32), &TrackerCell> {
        self.cells
            .iter()
            .map(|cell| ((cell.row, cell.column), cell))
            .collect()
    }
}

/// Cell-level export of the uploaded tracker workbook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TrackerWorkbook {
    #[serde(default)]
    pub sheets: Vec<TrackerSheet>,
}

impl TrackerWorkbook {
    pub fn from_json(content: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn sheet(&self, name: &str) -> AppResult<&TrackerSheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| AppError::schema_mismatch("tracker", vec![format!("sheet '{name}'")]))
    }
}

/// Fixed rectangle of tracker cells for one tower and activity. Bounds are
/// inclusive and 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerRange {
    pub tower: String,
    pub activity: String,
    pub rows: [u32; 2],
    pub columns: [u32; 2],
}

impl TrackerRange {
    pub fn coordinates(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.rows[0]..=self.rows[1])
            .flat_map(move |row| (self.columns[0]..=self.columns[1]).map(move |col| (row, col)))
    }

    pub fn is_well_formed(&self) -> bool {
        self.rows[0] >= 1
            && self.columns[0] >= 1
            && self.rows[0] <= self.rows[1]
            && self.columns[0] <= self.columns[1]
    }
}

/// Year and month whose cells are left out of historical counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IgnorePeriod {
    pub year: i32,
    pub month: u32,
}

impl IgnorePeriod {
    pub fn matches(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerCount {
    pub tower: String,
    pub completed_units: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_parse_from_text_and_serials() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(
            TrackerCellValue::Text("2025-03-14".into()).as_date(),
            Some(expected)
        );
        assert_eq!(
            TrackerCellValue::Text("14/03/2025".into()).as_date(),
            Some(expected)
        );
        assert_eq!(
            TrackerCellValue::Text("2025-03-14T00:00:00".into()).as_date(),
            Some(expected)
        );
        assert_eq!(
            TrackerCellValue::Text("14-Mar-2025 08:30".into()).as_date(),
            Some(expected)
        );
        let october = NaiveDate::from_ymd_opt(2024, 10, 15);
        assert_eq!(TrackerCellValue::Text("15-OCT-2024".into()).as_date(), october);
        assert_eq!(TrackerCellValue::Text("15-Oct-2024".into()).as_date(), october);
        assert_eq!(TrackerCellValue::Number(45730.0).as_date(), Some(expected));
        assert_eq!(TrackerCellValue::Number(12.0).as_date(), None);
        assert_eq!(TrackerCellValue::Text("done".into()).as_date(), None);
    }

    #[test]
    fn range_coordinates_are_inclusive() {
        let range = TrackerRange {
            tower: "EWS Tower 1".into(),
            activity: "Concreting".into(),
            rows: [2, 3],
            columns: [5, 6],
        };
        let coords: Vec<_> = range.coordinates().collect();
        assert_eq!(coords, vec![(2, 5), (2, 6), (3, 5), (3, 6)]);
        assert!(range.is_well_formed());
    }
}
