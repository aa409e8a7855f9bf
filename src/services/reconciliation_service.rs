use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::models::category::{CategorizationResult, ACTIVITY_CATALOG};
use crate::models::checklist::CatalogCount;
use crate::models::report::ReconciliationRow;
use crate::models::tracker::TrackerCount;

/// Joins closed-checklist counts with categorized completed-work totals.
///
/// Towers are the union of every input, each emitted in catalog order, so a
/// tower seen only by the tracker (or only by the checklists) still gets a
/// full set of rows.
pub fn reconcile(
    closed: &[CatalogCount],
    tracker_counts: &[TrackerCount],
    categorized: &[CategorizationResult],
) -> Vec<ReconciliationRow> {
    let closed_by_key: BTreeMap<(&str, &str), u32> = closed
        .iter()
        .map(|row| ((row.tower.as_str(), row.activity_name.as_str()), row.count))
        .collect();

    let mut completed_by_key: BTreeMap<(&str, &str), u32> = BTreeMap::new();
    for result in categorized {
        for total in &result.totals {
            completed_by_key
                .entry((result.tower.as_str(), total.activity_name.as_str()))
                .or_insert(total.total);
        }
    }

    let towers: BTreeSet<&str> = closed
        .iter()
        .map(|row| row.tower.as_str())
        .chain(tracker_counts.iter().map(|count| count.tower.as_str()))
        .chain(categorized.iter().map(|result| result.tower.as_str()))
        .collect();

    let mut rows = Vec::with_capacity(towers.len() * ACTIVITY_CATALOG.len());
    for tower in &towers {
        for (category, activity) in ACTIVITY_CATALOG {
            let key = (*tower, *activity);
            rows.push(ReconciliationRow::new(
                *tower,
                *category,
                *activity,
                completed_by_key.get(&key).copied().unwrap_or(0),
                closed_by_key.get(&key).copied().unwrap_or(0),
            ));
        }
    }

    for count in tracker_counts {
        let categorized_total: u32 = rows
            .iter()
            .filter(|row| row.tower == count.tower)
            .map(|row| row.completed_work)
            .sum();
        if categorized_total != count.completed_units {
            debug!(
                target: "app::report",
                tower = %count.tower,
                tracker_units = count.completed_units,
                categorized_total,
                "categorized totals differ from raw tracker units"
            );
        }
    }

    info!(
        target: "app::report",
        towers = towers.len(),
        rows = rows.len(),
        open_missing = rows.iter().map(|row| row.open_missing).sum::<u32>(),
        "reconciliation complete"
    );
    rows
}
