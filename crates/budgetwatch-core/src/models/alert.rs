//! Alert kind models

use serde::{Deserialize, Serialize};

/// Flavour of a spending recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Suggest cutting back for the rest of the month
    ReduceSpending,
    /// Suggest moving funds between categories
    CategoryReallocation,
    /// Point out money that could be saved
    SavingsOpportunity,
}

impl RecommendationKind {
    /// All recommendation kinds
    pub const ALL: [RecommendationKind; 3] = [
        RecommendationKind::ReduceSpending,
        RecommendationKind::CategoryReallocation,
        RecommendationKind::SavingsOpportunity,
    ];

    /// Stable snake_case key
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationKind::ReduceSpending => "reduce_spending",
            RecommendationKind::CategoryReallocation => "category_reallocation",
            RecommendationKind::SavingsOpportunity => "savings_opportunity",
        }
    }

    /// Parse a stable key back into a kind
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == key)
    }

    /// Tag used when building delivery identifiers
    pub fn tag(self) -> &'static str {
        match self {
            RecommendationKind::ReduceSpending => "reduceSpending",
            RecommendationKind::CategoryReallocation => "categoryReallocation",
            RecommendationKind::SavingsOpportunity => "savingsOpportunity",
        }
    }
}

/// Kind of alert the engine can raise for a budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    /// Utilization reached the alert threshold
    Warning,
    /// Spending exceeded the monthly limit
    Overrun,
    /// Explicitly requested spending advice
    Recommendation(RecommendationKind),
}

impl AlertKind {
    /// Stable key used in persisted history records
    pub fn storage_key(self) -> String {
        match self {
            AlertKind::Warning => "warning".to_string(),
            AlertKind::Overrun => "overrun".to_string(),
            AlertKind::Recommendation(kind) => format!("recommendation.{}", kind.as_str()),
        }
    }

    /// Parse a key produced by [`AlertKind::storage_key`]
    pub fn from_storage_key(key: &str) -> Option<Self> {
        match key {
            "warning" => Some(AlertKind::Warning),
            "overrun" => Some(AlertKind::Overrun),
            other => other
                .strip_prefix("recommendation.")
                .and_then(RecommendationKind::from_key)
                .map(AlertKind::Recommendation),
        }
    }

    /// Whether this kind is raised by the automatic check loop
    pub fn is_threshold_alert(self) -> bool {
        matches!(self, AlertKind::Warning | AlertKind::Overrun)
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys_parse_back() {
        let kinds = [
            AlertKind::Warning,
            AlertKind::Overrun,
            AlertKind::Recommendation(RecommendationKind::SavingsOpportunity),
        ];

        for kind in kinds {
            assert_eq!(AlertKind::from_storage_key(&kind.storage_key()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_storage_key() {
        assert_eq!(AlertKind::from_storage_key("recommendation.bogus"), None);
        assert_eq!(AlertKind::from_storage_key(""), None);
    }

    #[test]
    fn test_threshold_alert_kinds() {
        assert!(AlertKind::Warning.is_threshold_alert());
        assert!(AlertKind::Overrun.is_threshold_alert());
        assert!(!AlertKind::Recommendation(RecommendationKind::ReduceSpending).is_threshold_alert());
    }
}
