use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::checklist::AggregationOutput;
use crate::models::report::{ReconciliationRow, ReportExportResult};
use crate::models::snapshot::{DatasetSnapshot, UpstreamSnapshot};
use crate::models::tracker::{IgnorePeriod, TrackerCount, TrackerWorkbook};
use crate::services::categorizer_service::ActivityCategorizer;
use crate::services::checklist_aggregator::{ActivityCatalog, ChecklistAggregator};
use crate::services::document_service::DocumentServiceClient;
use crate::services::path_classifier::PathClassifier;
use crate::services::path_resolver::LocationTree;
use crate::services::reconciliation_service::reconcile;
use crate::services::record_normalizer::{parse_activities, parse_completions, parse_locations};
use crate::services::report_service::{build_workbook, export_report};
use crate::services::storage_service::{latest_matching, LocalDirectoryListing, ObjectListing};
use crate::services::tracker_service::{current_period, TrackerCrossChecker};

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report_path: PathBuf,
    pub report: ReportExportResult,
    pub rows: Vec<ReconciliationRow>,
    pub failed_datasets: Vec<String>,
}

/// Completed work per (tower, activity) plus the per-tower roll-up.
#[derive(Debug, Clone, Default)]
pub struct TrackerSummary {
    pub by_activity: BTreeMap<(String, String), u32>,
    pub counts: Vec<TrackerCount>,
}

impl TrackerSummary {
    pub fn towers(&self) -> BTreeSet<String> {
        self.counts.iter().map(|count| count.tower.clone()).collect()
    }

    pub fn activity_counts(&self, tower: &str) -> BTreeMap<String, u32> {
        self.by_activity
            .iter()
            .filter(|((owner, _), _)| owner == tower)
            .map(|((_, activity), count)| (activity.clone(), *count))
            .collect()
    }
}

/// State of one analysis invocation. Every accumulator lives here and is
/// dropped with the run.
pub struct AnalysisRun {
    config: AppConfig,
    aggregator: ChecklistAggregator,
    checker: TrackerCrossChecker,
    categorizer: ActivityCategorizer,
    aggregation: AggregationOutput,
    failed_datasets: Vec<String>,
}

impl AnalysisRun {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let categorizer = ActivityCategorizer::from_config(&config.categorizer)?;
        Ok(Self::with_categorizer(config, categorizer))
    }

    pub fn with_categorizer(config: AppConfig, categorizer: ActivityCategorizer) -> Self {
        let aggregator = ChecklistAggregator::new(PathClassifier::new(&config.classifier), config.workers);
        let checker = TrackerCrossChecker::new(&config.tracker.reference_fill);
        Self {
            config,
            aggregator,
            checker,
            categorizer,
            aggregation: AggregationOutput::default(),
            failed_datasets: Vec::new(),
        }
    }

    pub fn aggregation(&self) -> &AggregationOutput {
        &self.aggregation
    }

    pub fn failed_datasets(&self) -> &[String] {
        &self.failed_datasets
    }

    /// Normalizes and aggregates one dataset into the run. Missing columns
    /// halt the run.
    pub fn ingest_dataset(&mut self, snapshot: &DatasetSnapshot) -> AppResult<()> {
        let name = snapshot.name.as_str();
        let nodes = parse_locations(&format!("{name}/locations"), &snapshot.locations)?;
        let activities = parse_activities(&format!("{name}/activities"), &snapshot.activities)?;
        let records = parse_completions(&format!("{name}/associations"), &snapshot.associations)?;

        let tree = LocationTree::from_nodes(&nodes);
        let catalog = ActivityCatalog::from_definitions(&activities);
        let output = self
            .aggregator
            .aggregate(&records, &catalog, &tree, snapshot.kind)?;

        info!(
            target: "app::run",
            dataset = name,
            kind = snapshot.kind.as_str(),
            locations = tree.len(),
            activities = catalog.len(),
            records = records.len(),
            "dataset ingested"
        );
        self.aggregation.merge(output);
        Ok(())
    }

    pub fn ingest_snapshot(&mut self, snapshot: &UpstreamSnapshot) -> AppResult<()> {
        for dataset in &snapshot.datasets {
            self.ingest_dataset(dataset)?;
        }
        Ok(())
    }

    /// Fetches every configured dataset. Fetch failures are recorded and
    /// skipped; schema problems in fetched data stop the run.
    pub async fn fetch_upstream(&mut self) -> AppResult<()> {
        let client = DocumentServiceClient::try_new(&self.config.upstream)?;
        if client.has_credentials() {
            client.login().await?;
        } else {
            warn!(target: "app::run", "no upstream credentials configured, fetching anonymously");
        }

        let datasets = self.config.datasets.clone();
        for (name, result) in client.fetch_all(&datasets).await {
            match result {
                Ok(snapshot) => self.ingest_dataset(&snapshot)?,
                Err(error @ AppError::UpstreamFetch { .. }) => {
                    error!(target: "app::run", dataset = %name, error = %error, "dataset skipped");
                    self.failed_datasets.push(name);
                }
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    /// Tracker export to use: the explicit path, else the newest matching file
    /// in the configured source directory.
    pub fn locate_tracker(&self, explicit: Option<&Path>) -> AppResult<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Ok(Some(path.to_path_buf()));
        }
        let Some(dir) = &self.config.tracker.source_dir else {
            return Ok(None);
        };
        let listing = LocalDirectoryListing::new(dir);
        let objects = listing.list(&self.config.tracker.file_prefix)?;
        Ok(latest_matching(&objects, &self.config.tracker.file_prefix).map(|object| listing.path_of(object)))
    }

    pub fn load_tracker(&self, explicit: Option<&Path>) -> AppResult<Option<TrackerWorkbook>> {
        let Some(path) = self.locate_tracker(explicit)? else {
            warn!(target: "app::run", "no tracker workbook available, completed work will be zero");
            return Ok(None);
        };
        let content = std::fs::read_to_string(&path).map_err(|err| {
            AppError::validation(format!("cannot read tracker {}: {err}", path.display()))
        })?;
        info!(target: "app::run", path = %path.display(), "tracker workbook loaded");
        TrackerWorkbook::from_json(&content).map(Some)
    }

    fn ignore_period(&self) -> AppResult<IgnorePeriod> {
        match self.config.tracker.ignore {
            Some(period) => Ok(period),
            None => current_period(&self.config.tracker.timezone),
        }
    }

    pub fn summarize_tracker(&self, workbook: Option<&TrackerWorkbook>) -> AppResult<TrackerSummary> {
        let Some(workbook) = workbook else {
            return Ok(TrackerSummary::default());
        };
        let sheet = workbook.sheet(&self.config.tracker.sheet)?;
        let ignore = Some(self.ignore_period()?);
        let ranges = &self.config.tracker.ranges;

        Ok(TrackerSummary {
            by_activity: self.checker.count_by_activity(sheet, ranges, ignore),
            counts: self.checker.tracker_counts(sheet, ranges, ignore),
        })
    }

    /// Categorizes, reconciles and exports. Consumes the run.
    pub async fn finish(self, workbook: Option<&TrackerWorkbook>) -> AppResult<RunOutcome> {
        let tracker = self.summarize_tracker(workbook)?;

        let mut towers = tracker.towers();
        towers.extend(self.aggregation.tally.towers());

        let mut categorized = Vec::with_capacity(towers.len());
        for tower in &towers {
            let counts = tracker.activity_counts(tower);
            categorized.push(self.categorizer.categorize(&counts, tower).await);
        }

        let rows = reconcile(&self.aggregation.catalog_counts(), &tracker.counts, &categorized);
        let workbook = build_workbook(&rows);
        let report = export_report(&workbook, &self.config.report.output_dir, self.config.report.format)?;

        if !self.failed_datasets.is_empty() {
            warn!(
                target: "app::run",
                failed = ?self.failed_datasets,
                "report generated without some datasets"
            );
        }

        Ok(RunOutcome {
            report_path: PathBuf::from(&report.file_path),
            report,
            rows,
            failed_datasets: self.failed_datasets,
        })
    }
}

pub async fn run_online(config: AppConfig, tracker: Option<&Path>) -> AppResult<RunOutcome> {
    let mut run = AnalysisRun::new(config)?;
    run.fetch_upstream().await?;
    let workbook = run.load_tracker(tracker)?;
    run.finish(workbook.as_ref()).await
}

pub async fn run_offline(
    config: AppConfig,
    snapshot_path: &Path,
    tracker: Option<&Path>,
) -> AppResult<RunOutcome> {
    let content = std::fs::read_to_string(snapshot_path).map_err(|err| {
        AppError::validation(format!("cannot read snapshot {}: {err}", snapshot_path.display()))
    })?;
    let snapshot: UpstreamSnapshot = serde_json::from_str(&content)?;

    let mut run = AnalysisRun::new(config)?;
    run.ingest_snapshot(&snapshot)?;
    let workbook = run.load_tracker(tracker)?;
    run.finish(workbook.as_ref()).await
}
