use std::collections::BTreeMap;

use chrono::{Datelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::tracker::{IgnorePeriod, TrackerCount, TrackerRange, TrackerSheet};

/// Counts reference-green cells in the configured tracker rectangles.
#[derive(Debug, Clone)]
pub struct TrackerCrossChecker {
    reference_fill: String,
}

impl TrackerCrossChecker {
    pub fn new(reference_fill: &str) -> Self {
        Self {
            reference_fill: normalize_fill(reference_fill),
        }
    }

    pub fn is_marked(&self, fill: Option<&str>) -> bool {
        fill.map(normalize_fill)
            .is_some_and(|fill| fill == self.reference_fill)
    }

    /// Marked cells per (tower, activity). Cells whose value is a date in the
    /// ignore period are skipped.
    pub fn count_by_activity(
        &self,
        sheet: &TrackerSheet,
        ranges: &[TrackerRange],
        ignore: Option<IgnorePeriod>,
    ) -> BTreeMap<(String, String), u32> {
        let cells = sheet.index();
        let mut counts: BTreeMap<(String, String), u32> = BTreeMap::new();

        for range in ranges {
            let mut marked = 0;
            let mut skipped = 0;
            for coordinate in range.coordinates() {
                let Some(cell) = cells.get(&coordinate) else {
                    continue;
                };
                let in_ignored_period = match (ignore, cell.value.as_ref()) {
                    (Some(period), Some(value)) => {
                        value.as_date().is_some_and(|date| period.matches(date))
                    }
                    _ => false,
                };
                if in_ignored_period {
                    skipped += 1;
                    continue;
                }
                if self.is_marked(cell.fill.as_deref()) {
                    marked += 1;
                }
            }
            debug!(
                target: "app::tracker",
                tower = %range.tower,
                activity = %range.activity,
                marked,
                skipped,
                "tracker range counted"
            );
            *counts
                .entry((range.tower.clone(), range.activity.clone()))
                .or_insert(0) += marked;
        }

        counts
    }

    pub fn count_marked_cells(
        &self,
        sheet: &TrackerSheet,
        ranges: &[TrackerRange],
        ignore: Option<IgnorePeriod>,
    ) -> BTreeMap<String, u32> {
        let mut totals: BTreeMap<String, u32> = BTreeMap::new();
        for ((tower, _), count) in self.count_by_activity(sheet, ranges, ignore) {
            *totals.entry(tower).or_insert(0) += count;
        }
        info!(target: "app::tracker", towers = totals.len(), "tracker cells counted");
        totals
    }

    pub fn tracker_counts(
        &self,
        sheet: &TrackerSheet,
        ranges: &[TrackerRange],
        ignore: Option<IgnorePeriod>,
    ) -> Vec<TrackerCount> {
        self.count_marked_cells(sheet, ranges, ignore)
            .into_iter()
            .map(|(tower, completed_units)| TrackerCount {
                tower,
                completed_units,
            })
            .collect()
    }
}

/// Uppercase RGB without `#` or a leading alpha byte.
pub fn normalize_fill(value: &str) -> String {
    let hex = value.trim().trim_start_matches('#').to_ascii_uppercase();
    if hex.len() == 8 {
        hex.chars().skip(2).collect()
    } else {
        hex
    }
}

/// The month currently in progress at the site, which the tracker does not
/// yet count as history.
pub fn current_period(timezone: &str) -> AppResult<IgnorePeriod> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| AppError::config(format!("unknown timezone {timezone}")))?;
    let now = Utc::now().with_timezone(&tz);
    Ok(IgnorePeriod {
        year: now.year(),
        month: now.month(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tracker::{TrackerCell, TrackerCellValue};

    const GREEN: &str = "FF92D050";

    fn cell(row: u32, column: u32, value: Option<&str>, fill: Option<&str>) -> TrackerCell {
        TrackerCell {
            row,
            column,
            value: value.map(|text| TrackerCellValue::Text(text.to_string())),
            fill: fill.map(str::to_string),
        }
    }

    fn range(tower: &str, activity: &str, rows: [u32; 2], columns: [u32; 2]) -> TrackerRange {
        TrackerRange {
            tower: tower.into(),
            activity: activity.into(),
            rows,
            columns,
        }
    }

    fn sheet() -> TrackerSheet {
        TrackerSheet {
            name: "Tracker".into(),
            cells: vec![
                cell(2, 2, Some("2025-04-10"), Some(GREEN)),
                cell(3, 2, Some("2025-05-02"), Some("#92d050")),
                cell(4, 2, Some("2025-06-15"), Some(GREEN)),
                cell(5, 2, None, Some("FFFF0000")),
                cell(2, 3, None, Some(GREEN)),
                cell(9, 9, None, Some(GREEN)),
            ],
        }
    }

    #[test]
    fn counts_green_cells_per_tower() {
        let checker = TrackerCrossChecker::new("92D050");
        let ranges = vec![
            range("EWS Tower 1", "Concreting", [2, 5], [2, 2]),
            range("EWS Tower 1", "Shuttering", [2, 2], [3, 3]),
            range("LIG Tower 2", "Concreting", [10, 12], [2, 2]),
        ];
        let totals = checker.count_marked_cells(&sheet(), &ranges, None);
        assert_eq!(totals.get("EWS Tower 1"), Some(&4));
        assert_eq!(totals.get("LIG Tower 2"), Some(&0));
    }

    #[test]
    fn ignore_period_skips_matching_dates() {
        let checker = TrackerCrossChecker::new("#92D050");
        let ranges = vec![range("EWS Tower 1", "Concreting", [2, 5], [2, 2])];
        let by_activity = checker.count_by_activity(
            &sheet(),
            &ranges,
            Some(IgnorePeriod { year: 2025, month: 6 }),
        );
        assert_eq!(
            by_activity.get(&("EWS Tower 1".to_string(), "Concreting".to_string())),
            Some(&2)
        );
    }

    #[test]
    fn ignore_period_matches_upper_case_month_names() {
        let checker = TrackerCrossChecker::new("92D050");
        let sheet = TrackerSheet {
            name: "Tracker".into(),
            cells: vec![
                cell(2, 2, Some("15-OCT-2024"), Some(GREEN)),
                cell(3, 2, Some("02-SEP-2024"), Some(GREEN)),
                cell(4, 2, Some("2024-10-01T09:00:00"), Some(GREEN)),
            ],
        };
        let ranges = vec![range("LIG Tower 3", "Plastering", [2, 4], [2, 2])];
        let by_activity = checker.count_by_activity(
            &sheet,
            &ranges,
            Some(IgnorePeriod { year: 2024, month: 10 }),
        );
        assert_eq!(
            by_activity.get(&("LIG Tower 3".to_string(), "Plastering".to_string())),
            Some(&1)
        );
    }

    #[test]
    fn fill_normalization_drops_alpha_and_hash() {
        assert_eq!(normalize_fill("#92d050"), "92D050");
        assert_eq!(normalize_fill("FF92D050"), "92D050");
        assert!(current_period("Asia/Kolkata").is_ok());
        assert!(current_period("Mars/Olympus").is_err());
    }
}
