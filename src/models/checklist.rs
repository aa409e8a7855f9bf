use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::category::{
    catalog_activities, COMBINED_FIRST_FIX, FIRST_FIX_COMPONENTS,
};

/// Structural class of a dataset, deciding which paths are countable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Flat/unit level checklists.
    Finishing,
    /// Roof-slab checklists, stilt levels excluded.
    Structure,
    /// Slab-cycle report: strict tower/floor/slab shape with a 3-digit fallback.
    SlabCycle,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Finishing => "finishing",
            DatasetKind::Structure => "structure",
            DatasetKind::SlabCycle => "slab_cycle",
        }
    }
}

impl Default for DatasetKind {
    fn default() -> Self {
        DatasetKind::Finishing
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedCount {
    pub tower: String,
    pub activity_name: String,
    pub closed_checklist_count: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCount {
    pub tower: String,
    pub activity_name: String,
    pub count: u32,
}

/// Distinct completed location ids per (tower, activity).
///
/// Counts are always derived from the id sets, so folding in duplicate or
/// reordered records never changes the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecklistTally {
    locations: BTreeMap<(String, String), BTreeSet<String>>,
}

impl ChecklistTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tower: &str, activity: &str, location_id: &str) {
        self.locations
            .entry((tower.to_string(), activity.to_string()))
            .or_default()
            .insert(location_id.to_string());
    }

    pub fn merge(&mut self, other: ChecklistTally) {
        for (key, ids) in other.locations {
            self.locations.entry(key).or_default().extend(ids);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn count(&self, tower: &str, activity: &str) -> u32 {
        self.locations
            .get(&(tower.to_string(), activity.to_string()))
            .map(|ids| ids.len() as u32)
            .unwrap_or(0)
    }

    pub fn towers(&self) -> BTreeSet<String> {
        self.locations.keys().map(|(tower, _)| tower.clone()).collect()
    }

    pub fn counts(&self) -> Vec<AggregatedCount> {
        self.locations
            .iter()
            .map(|((tower, activity), ids)| AggregatedCount {
                tower: tower.clone(),
                activity_name: activity.clone(),
                closed_checklist_count: ids.len() as u32,
            })
            .collect()
    }

    /// Count table restricted to the fixed activity catalog. The combined
    /// first-fix entry is the smaller of its two component counts.
    pub fn catalog_counts(&self) -> Vec<CatalogCount> {
        let mut table = Vec::new();
        for tower in self.towers() {
            for activity in catalog_activities() {
                let count = if activity == COMBINED_FIRST_FIX {
                    let (first, second) = FIRST_FIX_COMPONENTS;
                    self.count(&tower, first).min(self.count(&tower, second))
                } else {
                    self.count(&tower, activity)
                };
                table.push(CatalogCount {
                    tower: tower.clone(),
                    activity_name: activity.to_string(),
                    count,
                });
            }
        }
        table
    }
}

/// Output of one aggregation pass (or several merged passes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationOutput {
    pub tally: ChecklistTally,
    pub dropped_by_filter: usize,
    pub unknown_activities: usize,
}

impl AggregationOutput {
    pub fn counts(&self) -> Vec<AggregatedCount> {
        self.tally.counts()
    }

    pub fn catalog_counts(&self) -> Vec<CatalogCount> {
        self.tally.catalog_counts()
    }

    pub fn is_empty(&self) -> bool {
        self.tally.is_empty()
    }

    pub fn merge(&mut self, other: AggregationOutput) {
        self.tally.merge(other.tally);
        self.dropped_by_filter += other.dropped_by_filter;
        self.unknown_activities += other.unknown_activities;
    }
}
