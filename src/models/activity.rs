use serde::{Deserialize, Serialize};

/// Known misspellings in the upstream activity catalog.
const ACTIVITY_NAME_CORRECTIONS: &[(&str, &str)] = &[
    ("Wall Conduting", "Wall Conducting"),
    ("Slab Conduting", "Slab Conducting"),
    ("Plumbing Works Frist Fix", "Plumbing Works First Fix"),
    ("Water Proofing Works", "Waterproofing Works"),
    ("De-Shutering", "De-Shuttering"),
];

/// Returns the display name for a raw activity name, applying the fixed
/// typo-correction table.
pub fn canonical_activity_name(raw: &str) -> String {
    let trimmed = raw.trim();
    ACTIVITY_NAME_CORRECTIONS
        .iter()
        .find(|(wrong, _)| wrong.eq_ignore_ascii_case(trimmed))
        .map(|(_, right)| right.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDefinition {
    pub sequence_id: String,
    pub name: String,
    #[serde(default)]
    pub form_type_id: String,
}

impl ActivityDefinition {
    pub fn new(
        sequence_id: impl Into<String>,
        name: impl AsRef<str>,
        form_type_id: impl Into<String>,
    ) -> Self {
        Self {
            sequence_id: sequence_id.into(),
            name: canonical_activity_name(name.as_ref()),
            form_type_id: form_type_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CompletionStatus {
    Completed,
    NotStarted,
    Unknown,
}

const STATUS_COLORS: &[(&str, CompletionStatus)] = &[
    ("#4CAF50", CompletionStatus::Completed),
    ("GREEN", CompletionStatus::Completed),
    ("#9E9E9E", CompletionStatus::NotStarted),
    ("GREY", CompletionStatus::NotStarted),
    ("GRAY", CompletionStatus::NotStarted),
];

impl CompletionStatus {
    pub fn from_status_name(value: &str) -> Self {
        let normalized: String = value
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "completed" | "complete" | "closed" => CompletionStatus::Completed,
            "notstarted" | "pending" => CompletionStatus::NotStarted,
            _ => CompletionStatus::Unknown,
        }
    }

    pub fn from_color(value: &str) -> Self {
        let normalized = value.trim().to_ascii_uppercase();
        STATUS_COLORS
            .iter()
            .find(|(color, _)| *color == normalized)
            .map(|(_, status)| *status)
            .unwrap_or(CompletionStatus::Unknown)
    }

    pub fn is_completed(self) -> bool {
        matches!(self, CompletionStatus::Completed)
    }
}

/// Raw unit of work: one status for one activity at one location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub location_id: String,
    pub activity_sequence: String,
    pub status: CompletionStatus,
}

impl CompletionRecord {
    pub fn new(
        location_id: impl Into<String>,
        activity_sequence: impl Into<String>,
        status: CompletionStatus,
    ) -> Self {
        Self {
            location_id: location_id.into(),
            activity_sequence: activity_sequence.into(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typo_table_corrects_known_misspellings() {
        assert_eq!(canonical_activity_name("Wall Conduting"), "Wall Conducting");
        assert_eq!(canonical_activity_name("  wall conduting "), "Wall Conducting");
        assert_eq!(canonical_activity_name("Concreting"), "Concreting");
    }

    #[test]
    fn status_is_mapped_from_name_and_color() {
        assert_eq!(
            CompletionStatus::from_status_name("Completed"),
            CompletionStatus::Completed
        );
        assert_eq!(
            CompletionStatus::from_status_name("Not Started"),
            CompletionStatus::NotStarted
        );
        assert_eq!(
            CompletionStatus::from_color("#4caf50"),
            CompletionStatus::Completed
        );
        assert_eq!(
            CompletionStatus::from_color("#123456"),
            CompletionStatus::Unknown
        );
    }
}
