use std::collections::{HashMap, HashSet};
use std::thread;

use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::activity::{canonical_activity_name, ActivityDefinition, CompletionRecord};
use crate::models::checklist::{AggregationOutput, ChecklistTally, DatasetKind};
use crate::models::location::ResolvedPath;
use crate::services::path_classifier::PathClassifier;
use crate::services::path_resolver::LocationTree;

/// Sequence id to display name, typo-corrected.
#[derive(Debug, Clone, Default)]
pub struct ActivityCatalog {
    names: HashMap<String, String>,
}

impl ActivityCatalog {
    pub fn from_definitions(definitions: &[ActivityDefinition]) -> Self {
        let names = definitions
            .iter()
            .map(|definition| {
                (
                    definition.sequence_id.clone(),
                    canonical_activity_name(&definition.name),
                )
            })
            .collect();
        Self { names }
    }

    pub fn name(&self, sequence_id: &str) -> Option<&str> {
        self.names.get(sequence_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

struct JoinedRecord<'a> {
    location_id: &'a str,
    tower: &'a str,
    activity: &'a str,
}

#[derive(Debug, Clone)]
pub struct ChecklistAggregator {
    classifier: PathClassifier,
    workers: usize,
}

impl ChecklistAggregator {
    pub fn new(classifier: PathClassifier, workers: usize) -> Self {
        Self {
            classifier,
            workers: workers.max(1),
        }
    }

    pub fn resolve(&self, tree: &LocationTree, location_id: &str) -> ResolvedPath {
        let segments = tree.resolve(location_id);
        let joined = segments.join("/");
        ResolvedPath {
            location_id: location_id.to_string(),
            tower_label: self.classifier.extract_tower(&joined),
            segments,
        }
    }

    /// Distinct completed locations per (tower, activity) for one dataset.
    /// Records whose path fails the dataset's structural filter, or whose
    /// activity is not in the catalog, are dropped.
    pub fn aggregate(
        &self,
        records: &[CompletionRecord],
        catalog: &ActivityCatalog,
        tree: &LocationTree,
        kind: DatasetKind,
    ) -> AppResult<AggregationOutput> {
        let completed: Vec<&CompletionRecord> = records
            .iter()
            .filter(|record| record.status.is_completed())
            .collect();
        if completed.is_empty() {
            debug!(target: "app::aggregate", kind = kind.as_str(), "no completed records");
            return Ok(AggregationOutput::default());
        }

        // Paths are a pure function of the tree, resolve each location once.
        let mut resolved: HashMap<&str, (ResolvedPath, String)> = HashMap::new();
        for record in completed.iter().copied() {
            resolved
                .entry(record.location_id.as_str())
                .or_insert_with(|| {
                    let path = self.resolve(tree, &record.location_id);
                    let joined = path.joined();
                    (path, joined)
                });
        }

        let candidates: Vec<&str> = resolved.values().map(|(_, joined)| joined.as_str()).collect();
        let accepted: HashSet<&str> = self.classifier.select(kind, &candidates);

        let mut dropped_by_filter = 0;
        let mut unknown_activities = 0;
        let mut joined = Vec::with_capacity(completed.len());
        for record in completed.iter().copied() {
            let Some((path, joined_path)) = resolved.get(record.location_id.as_str()) else {
                continue;
            };
            if !accepted.contains(joined_path.as_str()) {
                dropped_by_filter += 1;
                continue;
            }
            let Some(activity) = catalog.name(&record.activity_sequence) else {
                unknown_activities += 1;
                continue;
            };
            joined.push(JoinedRecord {
                location_id: record.location_id.as_str(),
                tower: path.tower_label.as_str(),
                activity,
            });
        }

        let tally = self.tally_in_chunks(&joined)?;
        info!(
            target: "app::aggregate",
            kind = kind.as_str(),
            counted = joined.len(),
            dropped_by_filter,
            unknown_activities,
            "dataset aggregated"
        );

        Ok(AggregationOutput {
            tally,
            dropped_by_filter,
            unknown_activities,
        })
    }

    fn tally_in_chunks(&self, joined: &[JoinedRecord<'_>]) -> AppResult<ChecklistTally> {
        if joined.is_empty() {
            return Ok(ChecklistTally::new());
        }

        let chunk_size = (joined.len() + self.workers - 1) / self.workers;
        let mut partials = thread::scope(|scope| {
            let mut handles = Vec::new();
            for (index, chunk) in joined.chunks(chunk_size).enumerate() {
                let handle = thread::Builder::new()
                    .name(format!("aggregate-{index}"))
                    .spawn_scoped(scope, move || (index, tally_chunk(chunk)))
                    .map_err(|err| {
                        AppError::other(format!("failed to start aggregation worker: {err}"))
                    })?;
                handles.push(handle);
            }

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| AppError::other("aggregation worker panicked"))
                })
                .collect::<AppResult<Vec<_>>>()
        })?;

        partials.sort_by_key(|(index, _)| *index);
        let mut tally = ChecklistTally::new();
        for (_, partial) in partials {
            tally.merge(partial);
        }
        Ok(tally)
    }
}

fn tally_chunk(chunk: &[JoinedRecord<'_>]) -> ChecklistTally {
    let mut tally = ChecklistTally::new();
    for record in chunk {
        tally.record(record.tower, record.activity, record.location_id);
    }
    tally
}
