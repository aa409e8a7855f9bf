use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstructionCategory {
    #[serde(rename = "Civil Works")]
    Civil,
    #[serde(rename = "MEP Works")]
    Mep,
    #[serde(rename = "Interior Finishing Works")]
    InteriorFinishing,
    #[serde(rename = "External Development Activities")]
    ExternalDevelopment,
}

impl ConstructionCategory {
    pub const ALL: [ConstructionCategory; 4] = [
        ConstructionCategory::Civil,
        ConstructionCategory::Mep,
        ConstructionCategory::InteriorFinishing,
        ConstructionCategory::ExternalDevelopment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructionCategory::Civil => "Civil Works",
            ConstructionCategory::Mep => "MEP Works",
            ConstructionCategory::InteriorFinishing => "Interior Finishing Works",
            ConstructionCategory::ExternalDevelopment => "External Development Activities",
        }
    }

    /// Accepts the canonical label or a loose variant ("MEP", "civil").
    pub fn parse(value: &str) -> Option<Self> {
        let lower = value.trim().to_ascii_lowercase();
        if lower.starts_with("civil") {
            Some(ConstructionCategory::Civil)
        } else if lower.starts_with("mep") {
            Some(ConstructionCategory::Mep)
        } else if lower.starts_with("interior") {
            Some(ConstructionCategory::InteriorFinishing)
        } else if lower.starts_with("external") {
            Some(ConstructionCategory::ExternalDevelopment)
        } else {
            None
        }
    }
}

impl fmt::Display for ConstructionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const COMBINED_FIRST_FIX: &str = "Min. count of UP-First Fix and CP-First Fix";
pub const FIRST_FIX_COMPONENTS: (&str, &str) = ("UP-First Fix", "CP-First Fix");

/// Fixed activity catalog, in report order.
pub const ACTIVITY_CATALOG: &[(ConstructionCategory, &str)] = &[
    (ConstructionCategory::Civil, "Concreting"),
    (ConstructionCategory::Civil, "Shuttering"),
    (ConstructionCategory::Civil, "Reinforcement"),
    (ConstructionCategory::Civil, "De-Shuttering"),
    (ConstructionCategory::Civil, "Brickwork"),
    (ConstructionCategory::Civil, "Plastering"),
    (ConstructionCategory::Mep, "EL-First Fix"),
    (ConstructionCategory::Mep, COMBINED_FIRST_FIX),
    (ConstructionCategory::Mep, "EL-Second Fix"),
    (ConstructionCategory::Mep, "Wall Conducting"),
    (ConstructionCategory::Mep, "Slab Conducting"),
    (ConstructionCategory::InteriorFinishing, "C-Gypsum and POP Punning"),
    (ConstructionCategory::InteriorFinishing, "Waterproofing Works"),
    (ConstructionCategory::InteriorFinishing, "Wall Tiling"),
    (ConstructionCategory::InteriorFinishing, "Floor Tiling"),
    (ConstructionCategory::InteriorFinishing, "Installation of doors"),
    (ConstructionCategory::InteriorFinishing, "Painting Works"),
    (ConstructionCategory::ExternalDevelopment, "Sewer Line"),
    (ConstructionCategory::ExternalDevelopment, "Storm Line"),
    (ConstructionCategory::ExternalDevelopment, "Kerb Stone"),
];

pub fn catalog_activities() -> impl Iterator<Item = &'static str> {
    ACTIVITY_CATALOG.iter().map(|(_, name)| *name)
}

pub fn category_of(activity: &str) -> Option<ConstructionCategory> {
    ACTIVITY_CATALOG
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(activity.trim()))
        .map(|(category, _)| *category)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CategorizationSource {
    Provider,
    Fallback,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedTotal {
    pub tower: String,
    pub category: ConstructionCategory,
    pub activity_name: String,
    pub total: u32,
}

/// Element of the categorizer's JSON reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryGroup {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Activities")]
    pub activities: Vec<ActivityTotal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityTotal {
    #[serde(rename = "ActivityName")]
    pub activity_name: String,
    #[serde(rename = "Total")]
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationResult {
    pub tower: String,
    pub source: CategorizationSource,
    pub totals: Vec<CategorizedTotal>,
}
