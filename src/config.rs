//! Run configuration

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::checklist::DatasetKind;
use crate::models::report::ReportFormat;
use crate::models::tracker::{IgnorePeriod, TrackerRange};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub categorizer: CategorizerConfig,
    #[serde(default)]
    pub report: ReportConfig,
    /// Worker threads for the aggregation stage
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Directory for rolling log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub project_id: String,
    /// Page size sent as `recordLimit`
    #[serde(default = "default_record_limit")]
    pub record_limit: usize,
    /// Delay between two pages of the same dataset
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            username: None,
            password: None,
            project_id: String::new(),
            record_limit: default_record_limit(),
            page_delay_ms: default_page_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    pub fn page_delay(&self) -> StdDuration {
        StdDuration::from_millis(self.page_delay_ms)
    }

    pub fn timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetConfig {
    pub name: String,
    /// Quality plan id on the document service
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub kind: DatasetKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Source-category tags prefixed to tower labels, earliest in the path wins
    #[serde(default = "default_category_keywords")]
    pub category_keywords: Vec<String>,
    #[serde(default = "default_roof_slab_keywords")]
    pub roof_slab_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            category_keywords: default_category_keywords(),
            roof_slab_keywords: default_roof_slab_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_tracker_sheet")]
    pub sheet: String,
    /// Fill color counted as completed work
    #[serde(default = "default_reference_green")]
    pub reference_fill: String,
    /// Used to derive the in-progress month when no ignore period is set
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub ignore: Option<IgnorePeriod>,
    /// Directory searched for the latest tracker export
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    #[serde(default = "default_tracker_prefix")]
    pub file_prefix: String,
    #[serde(default)]
    pub ranges: Vec<TrackerRange>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sheet: default_tracker_sheet(),
            reference_fill: default_reference_green(),
            timezone: default_timezone(),
            ignore: None,
            source_dir: None,
            file_prefix: default_tracker_prefix(),
            ranges: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizerConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_url")]
    pub api_base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: default_llm_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl CategorizerConfig {
    pub fn timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub format: ReportFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: ReportFormat::default(),
        }
    }
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

fn default_upstream_url() -> String {
    "https://dms.example.com/api".to_string()
}

fn default_record_limit() -> usize {
    1000
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_category_keywords() -> Vec<String> {
    vec!["EWS".to_string(), "LIG".to_string()]
}

fn default_roof_slab_keywords() -> Vec<String> {
    ["roof slab", "roof-slab", "roofslab", "terrace slab"]
        .iter()
        .map(|value| value.to_string())
        .collect()
}

fn default_tracker_sheet() -> String {
    "Tracker".to_string()
}

fn default_reference_green() -> String {
    "92D050".to_string()
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_tracker_prefix() -> String {
    "tracker".to_string()
}

fn default_llm_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl AppConfig {
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            AppError::config(format!("cannot read {}: {err}", path.display()))
        })?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> AppResult<Self> {
        let mut config: AppConfig = serde_yaml::from_str(content)?;
        if config.workers == 0 {
            config.workers = default_workers();
        }
        Ok(config)
    }

    /// Environment values take precedence over the file; blank values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(value) = env_value("SITECHECK_USERNAME") {
            self.upstream.username = Some(value);
        }
        if let Some(value) = env_value("SITECHECK_PASSWORD") {
            self.upstream.password = Some(value);
        }
        if let Some(value) = env_value("SITECHECK_BASE_URL") {
            self.upstream.base_url = value;
        }
        if let Some(value) = env_value("SITECHECK_LLM_API_KEY") {
            self.categorizer.api_key = Some(value);
        }
        if let Some(value) = env_value("SITECHECK_LLM_BASE_URL") {
            self.categorizer.api_base_url = value;
        }
        if let Some(value) = env_value("SITECHECK_LLM_MODEL") {
            self.categorizer.model = value;
        }

        self.categorizer.api_key = self
            .categorizer
            .api_key
            .take()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.datasets.is_empty() {
            return Err(AppError::config("at least one dataset must be configured"));
        }
        if self.upstream.record_limit == 0 {
            return Err(AppError::config("upstream.record_limit must be positive"));
        }
        if let Some(period) = self.tracker.ignore {
            if !(1..=12).contains(&period.month) {
                return Err(AppError::config(format!(
                    "tracker.ignore.month {} is outside 1..=12",
                    period.month
                )));
            }
        }
        if let Some(range) = self.tracker.ranges.iter().find(|range| !range.is_well_formed()) {
            return Err(AppError::config(format!(
                "tracker range for {} / {} is inverted or zero-based",
                range.tower, range.activity
            )));
        }
        if self.tracker.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(AppError::config(format!(
                "unknown tracker timezone {}",
                self.tracker.timezone
            )));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
