use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Lists stored objects by key prefix.
pub trait ObjectListing: Send + Sync {
    fn list(&self, prefix: &str) -> AppResult<Vec<StoredObject>>;
}

/// Directory-backed listing; keys are file names.
#[derive(Debug, Clone)]
pub struct LocalDirectoryListing {
    root: PathBuf,
}

impl LocalDirectoryListing {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, object: &StoredObject) -> PathBuf {
        self.root.join(&object.key)
    }
}

impl ObjectListing for LocalDirectoryListing {
    fn list(&self, prefix: &str) -> AppResult<Vec<StoredObject>> {
        let entries = fs::read_dir(&self.root).map_err(|err| {
            AppError::config(format!("cannot list {}: {err}", self.root.display()))
        })?;

        let mut objects = Vec::new();
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let key = entry.file_name().to_string_lossy().to_string();
            if !key.starts_with(prefix) {
                continue;
            }
            let last_modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH));
            objects.push(StoredObject { key, last_modified });
        }
        debug!(target: "app::run", prefix, found = objects.len(), "objects listed");
        Ok(objects)
    }
}

static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2})[-.](\d{2})[-.](\d{4})").expect("day-first date pattern")
});
static YEAR_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("year-first date pattern"));

/// Date embedded in a file name, `YYYY-MM-DD` tried before `DD-MM-YYYY` and
/// `DD.MM.YYYY`.
pub fn date_in_name(key: &str) -> Option<NaiveDate> {
    let year_first = YEAR_FIRST.captures_iter(key).find_map(|captures| {
        NaiveDate::from_ymd_opt(
            captures[1].parse().ok()?,
            captures[2].parse().ok()?,
            captures[3].parse().ok()?,
        )
    });
    year_first.or_else(|| {
        DAY_FIRST.captures_iter(key).find_map(|captures| {
            NaiveDate::from_ymd_opt(
                captures[3].parse().ok()?,
                captures[2].parse().ok()?,
                captures[1].parse().ok()?,
            )
        })
    })
}

/// Newest object under `prefix`. Objects with a date in their name outrank
/// those without; equal dates fall back to modification time, then key.
pub fn latest_matching<'a>(objects: &'a [StoredObject], prefix: &str) -> Option<&'a StoredObject> {
    let latest = objects
        .iter()
        .filter(|object| object.key.starts_with(prefix))
        .max_by(|left, right| {
            let left_key = (date_in_name(&left.key), left.last_modified, &left.key);
            let right_key = (date_in_name(&right.key), right.last_modified, &right.key);
            left_key.cmp(&right_key)
        });
    if let Some(object) = latest {
        info!(target: "app::run", key = %object.key, "latest object selected");
    }
    latest
}
