use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::config::ClassifierConfig;
use crate::models::checklist::DatasetKind;

pub const UNKNOWN_TOWER: &str = "Unknown";
pub const UNKNOWN_CATEGORY: &str = "Unknown";

static UNIT_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\d+\s*(?:\(\s*(?:ll|ul|lower|upper)(?:\s*level)?\s*\)|[-_ ]*(?:ll|ul|lower|upper)(?:\s*level)?)?$",
    )
    .expect("unit level pattern")
});

static STILT_ROOF_SLAB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)stilt\s*roof\s*slab").expect("stilt pattern")
});

static STRICT_SLAB_CYCLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^Quality/Tower-[A-Z0-9]+(?:\s*\([^/]*\)|[-_ ][^/]*)?/[A-Z]*\d+[A-Z]*/Roof Slab/\d{3}$",
    )
    .expect("strict slab cycle pattern")
});

static THREE_DIGIT_LEAF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|/)\d{3}$").expect("three digit leaf pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupUnit {
    Tower,
    Pour,
    /// Whichever keyword the segment contains.
    FromSegment,
}

/// One tier of tower/pour extraction; tiers are tried in order and the first
/// capture wins.
struct TowerRule {
    name: &'static str,
    pattern: Regex,
    unit: GroupUnit,
}

static TOWER_RULES: Lazy<Vec<TowerRule>> = Lazy::new(|| {
    vec![
        TowerRule {
            name: "tower-designator",
            pattern: Regex::new(r"(?i)towers?\s*[-_.]?\s*([a-z]?\d+[a-z]?|[a-z])\b")
                .expect("tower designator pattern"),
            unit: GroupUnit::Tower,
        },
        TowerRule {
            name: "pour-designator",
            pattern: Regex::new(r"(?i)pours?\s*[-_.]?\s*([a-z]?\d+[a-z]?|[a-z])\b")
                .expect("pour designator pattern"),
            unit: GroupUnit::Pour,
        },
        TowerRule {
            name: "trailing-number",
            pattern: Regex::new(r"(\d+)\s*$").expect("trailing number pattern"),
            unit: GroupUnit::FromSegment,
        },
    ]
});

fn mentions_group(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    lower.contains("tower") || lower.contains("pour")
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path).trim()
}

pub fn is_unit_level(path: &str) -> bool {
    UNIT_LEVEL.is_match(last_segment(path))
}

pub fn is_stilt_roof_slab(path: &str) -> bool {
    STILT_ROOF_SLAB.is_match(path)
}

/// Slab-cycle selection: the rigid `Quality/Tower-X/<floor>/Roof Slab/NNN`
/// shape first, any path ending in a 3-digit segment when nothing matches
/// strictly, stilt slabs removed in both tiers.
pub fn select_slab_cycle_paths<'a>(paths: &[&'a str]) -> HashSet<&'a str> {
    let strict: HashSet<&str> = paths
        .iter()
        .copied()
        .filter(|path| STRICT_SLAB_CYCLE.is_match(path))
        .collect();

    let selected = if strict.is_empty() {
        let fallback: HashSet<&str> = paths
            .iter()
            .copied()
            .filter(|path| THREE_DIGIT_LEAF.is_match(path))
            .collect();
        if !paths.is_empty() {
            info!(
                target: "app::paths",
                candidates = paths.len(),
                matched = fallback.len(),
                "strict slab-cycle shape matched nothing, using three-digit fallback"
            );
        }
        fallback
    } else {
        strict
    };

    selected
        .into_iter()
        .filter(|path| !is_stilt_roof_slab(path))
        .collect()
}

#[derive(Debug, Clone)]
pub struct PathClassifier {
    category_keywords: Vec<String>,
    roof_slab_keywords: Vec<String>,
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl PathClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            category_keywords: config
                .category_keywords
                .iter()
                .map(|keyword| keyword.trim().to_string())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
            roof_slab_keywords: config
                .roof_slab_keywords
                .iter()
                .map(|keyword| keyword.trim().to_ascii_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }

    pub fn is_unit_level(&self, path: &str) -> bool {
        is_unit_level(path)
    }

    pub fn is_roof_slab_only(&self, path: &str) -> bool {
        let leaf = last_segment(path).to_ascii_lowercase();
        self.roof_slab_keywords
            .iter()
            .any(|keyword| leaf.contains(keyword.as_str()))
    }

    /// Category keyword that occurs earliest in the path. With no keywords
    /// configured, tower labels carry no prefix.
    pub fn category_of(&self, path: &str) -> Option<String> {
        if self.category_keywords.is_empty() {
            return None;
        }
        let earliest = self
            .category_keywords
            .iter()
            .filter_map(|keyword| path.find(keyword.as_str()).map(|index| (index, keyword)))
            .min_by_key(|(index, _)| *index)
            .map(|(_, keyword)| keyword.clone());
        Some(earliest.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()))
    }

    pub fn extract_tower(&self, path: &str) -> String {
        let Some((unit, designator)) = path
            .split('/')
            .filter(|segment| mentions_group(segment))
            .find_map(extract_designator)
        else {
            return UNKNOWN_TOWER.to_string();
        };

        match self.category_of(path) {
            Some(category) => format!("{category} {unit} {designator}"),
            None => format!("{unit} {designator}"),
        }
    }

    /// Whether a single path is countable for the dataset kind. Slab-cycle
    /// datasets need the whole path set, see [`PathClassifier::select`].
    pub fn passes(&self, kind: DatasetKind, path: &str) -> bool {
        match kind {
            DatasetKind::Finishing => self.is_unit_level(path),
            DatasetKind::Structure => self.is_roof_slab_only(path) && !is_stilt_roof_slab(path),
            DatasetKind::SlabCycle => !select_slab_cycle_paths(&[path]).is_empty(),
        }
    }

    pub fn select<'a>(&self, kind: DatasetKind, paths: &[&'a str]) -> HashSet<&'a str> {
        match kind {
            DatasetKind::SlabCycle => select_slab_cycle_paths(paths),
            _ => paths
                .iter()
                .copied()
                .filter(|path| self.passes(kind, path))
                .collect(),
        }
    }
}

fn extract_designator(segment: &str) -> Option<(&'static str, String)> {
    TOWER_RULES.iter().find_map(|rule| {
        let captures = rule.pattern.captures(segment)?;
        let designator = captures.get(1)?.as_str().to_ascii_uppercase();
        let unit = match rule.unit {
            GroupUnit::Tower => "Tower",
            GroupUnit::Pour => "Pour",
            GroupUnit::FromSegment if segment.to_ascii_lowercase().contains("tower") => "Tower",
            GroupUnit::FromSegment => "Pour",
        };
        debug!(target: "app::paths", rule = rule.name, segment, %designator, "tower rule matched");
        Some((unit, designator))
    })
}
