//! Budget data models

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Spending category of a budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Supermarkets and food shopping
    Groceries,
    /// Restaurants, cafes and takeaway
    Dining,
    /// Fuel, transit and ride sharing
    Transportation,
    /// Streaming, events and hobbies
    Entertainment,
    /// Clothing and general retail
    Shopping,
    /// Power, water, phone and internet
    Utilities,
    /// Pharmacy and medical
    Healthcare,
    /// Rent, mortgage and household
    Housing,
    /// Flights and accommodation
    Travel,
    /// Anything else
    #[default]
    Other,
}

impl Category {
    /// All known categories, in display order
    pub const ALL: [Category; 10] = [
        Category::Groceries,
        Category::Dining,
        Category::Transportation,
        Category::Entertainment,
        Category::Shopping,
        Category::Utilities,
        Category::Healthcare,
        Category::Housing,
        Category::Travel,
        Category::Other,
    ];

    /// Human-readable label used in notification text
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Groceries => "Groceries",
            Category::Dining => "Dining Out",
            Category::Transportation => "Transportation",
            Category::Entertainment => "Entertainment",
            Category::Shopping => "Shopping",
            Category::Utilities => "Utilities",
            Category::Healthcare => "Healthcare",
            Category::Housing => "Housing",
            Category::Travel => "Travel",
            Category::Other => "Other",
        }
    }

    /// Icon shown next to the category label
    pub fn icon(self) -> &'static str {
        match self {
            Category::Groceries => "🛒",
            Category::Dining => "🍽️",
            Category::Transportation => "🚗",
            Category::Entertainment => "🎬",
            Category::Shopping => "🛍️",
            Category::Utilities => "💡",
            Category::Healthcare => "💊",
            Category::Housing => "🏠",
            Category::Travel => "✈️",
            Category::Other => "📦",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A monthly budget snapshot, supplied read-only by the surrounding application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Stable identifier
    pub id: String,

    /// Spending category
    #[serde(default)]
    pub category: Category,

    /// Monthly spending limit, must be positive
    pub monthly_limit: f64,

    /// Amount spent so far this month
    pub current_spent: f64,

    /// Fraction of the limit at which a warning fires
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
}

fn default_alert_threshold() -> f64 {
    0.8
}

impl Budget {
    /// Create a budget with the default 80% alert threshold
    pub fn new(id: impl Into<String>, category: Category, monthly_limit: f64, current_spent: f64) -> Self {
        Self {
            id: id.into(),
            category,
            monthly_limit,
            current_spent,
            alert_threshold: default_alert_threshold(),
        }
    }

    /// Override the alert threshold
    #[must_use]
    pub fn with_threshold(mut self, alert_threshold: f64) -> Self {
        self.alert_threshold = alert_threshold;
        self
    }

    /// Check the caller-level invariants of a budget snapshot
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("budget id must not be empty"));
        }
        if !self.monthly_limit.is_finite() || self.monthly_limit <= 0.0 {
            return Err(Error::validation(format!(
                "monthly limit must be positive, got {}",
                self.monthly_limit
            )));
        }
        if !self.current_spent.is_finite() || self.current_spent < 0.0 {
            return Err(Error::validation(format!(
                "current spent must be non-negative, got {}",
                self.current_spent
            )));
        }
        if !(0.0..=1.0).contains(&self.alert_threshold) {
            return Err(Error::validation(format!(
                "alert threshold must be within [0, 1], got {}",
                self.alert_threshold
            )));
        }
        Ok(())
    }

    /// Fraction of the monthly limit already spent
    pub fn utilization(&self) -> f64 {
        self.current_spent / self.monthly_limit
    }

    /// Utilization expressed as a percentage
    pub fn utilization_percent(&self) -> f64 {
        self.utilization() * 100.0
    }

    /// Whether spending has exceeded the limit
    pub fn is_over_budget(&self) -> bool {
        self.current_spent > self.monthly_limit
    }

    /// Whether utilization has reached the alert threshold (inclusive)
    pub fn is_near_limit(&self) -> bool {
        self.utilization() >= self.alert_threshold
    }

    /// Amount left before the limit is reached, never negative
    pub fn remaining(&self) -> f64 {
        (self.monthly_limit - self.current_spent).max(0.0)
    }

    /// Amount spent beyond the limit, never negative
    pub fn overrun(&self) -> f64 {
        (self.current_spent - self.monthly_limit).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_values() {
        let budget = Budget::new("groceries", Category::Groceries, 300.0, 275.0);

        assert!((budget.utilization() - 0.9167).abs() < 0.001);
        assert!(budget.is_near_limit());
        assert!(!budget.is_over_budget());
        assert!((budget.remaining() - 25.0).abs() < f64::EPSILON);
        assert!(budget.overrun().abs() < f64::EPSILON);
    }

    #[test]
    fn test_overrun_is_clamped() {
        let budget = Budget::new("dining", Category::Dining, 300.0, 305.0);

        assert!(budget.is_over_budget());
        assert!(budget.remaining().abs() < f64::EPSILON);
        assert!((budget.overrun() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_non_positive_limit() {
        let budget = Budget::new("broken", Category::Other, 0.0, 10.0);
        assert!(matches!(budget.validate(), Err(Error::Validation(_))));

        let budget = Budget::new("negative", Category::Other, -5.0, 10.0);
        assert!(budget.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let budget = Budget::new("b", Category::Travel, 100.0, 10.0).with_threshold(1.5);
        assert!(budget.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let budget: Budget =
            serde_json::from_str(r#"{"id":"b1","monthly_limit":100.0,"current_spent":5.0}"#)
                .unwrap();

        assert_eq!(budget.category, Category::Other);
        assert!((budget.alert_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_category_metadata() {
        assert_eq!(Category::Dining.display_name(), "Dining Out");
        assert_eq!(Category::Groceries.to_string(), "Groceries");
        assert!(Category::ALL.iter().all(|c| !c.icon().is_empty()));
    }
}
