//! Threshold detection for budget snapshots

use std::collections::BTreeSet;

use crate::models::{AlertKind, Budget};

/// Utilization above which spending recommendations are offered
pub const RECOMMENDATION_UTILIZATION: f64 = 0.5;

/// Decides which threshold alerts a budget snapshot should raise.
///
/// Callers must validate the budget first; a non-positive limit makes
/// utilization meaningless.
pub fn evaluate(budget: &Budget) -> BTreeSet<AlertKind> {
    let mut kinds = BTreeSet::new();

    if budget.is_over_budget() {
        kinds.insert(AlertKind::Overrun);
    } else if budget.is_near_limit() {
        kinds.insert(AlertKind::Warning);
    }

    kinds
}

/// Whether an explicitly requested recommendation should fire
pub fn should_recommend(budget: &Budget) -> bool {
    budget.utilization() > RECOMMENDATION_UTILIZATION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use proptest::prelude::*;
    use rstest::rstest;

    fn budget(limit: f64, spent: f64, threshold: f64) -> Budget {
        Budget::new("b", Category::Groceries, limit, spent).with_threshold(threshold)
    }

    #[rstest]
    #[case::below_threshold(300.0, 100.0, 0.8, None)]
    #[case::near_limit(300.0, 275.0, 0.8, Some(AlertKind::Warning))]
    #[case::exactly_threshold(100.0, 80.0, 0.8, Some(AlertKind::Warning))]
    #[case::exactly_limit(300.0, 300.0, 0.8, Some(AlertKind::Warning))]
    #[case::over_limit(300.0, 305.0, 0.8, Some(AlertKind::Overrun))]
    #[case::over_limit_zero_threshold(300.0, 305.0, 0.0, Some(AlertKind::Overrun))]
    #[case::zero_threshold(300.0, 0.0, 0.0, Some(AlertKind::Warning))]
    fn test_evaluate(
        #[case] limit: f64,
        #[case] spent: f64,
        #[case] threshold: f64,
        #[case] expected: Option<AlertKind>,
    ) {
        let kinds = evaluate(&budget(limit, spent, threshold));
        assert_eq!(kinds.into_iter().collect::<Vec<_>>(), expected.into_iter().collect::<Vec<_>>());
    }

    #[rstest]
    #[case(100.0, 50.0, false)]
    #[case(100.0, 50.01, true)]
    #[case(100.0, 95.0, true)]
    fn test_should_recommend(#[case] limit: f64, #[case] spent: f64, #[case] expected: bool) {
        assert_eq!(should_recommend(&budget(limit, spent, 0.8)), expected);
    }

    proptest! {
        #[test]
        fn warning_and_overrun_never_fire_together(
            limit in 1.0f64..10_000.0,
            spent in 0.0f64..20_000.0,
            threshold in 0.0f64..=1.0,
        ) {
            let b = budget(limit, spent, threshold);
            let kinds = evaluate(&b);

            prop_assert!(kinds.len() <= 1);
            if b.is_over_budget() {
                prop_assert!(kinds.contains(&AlertKind::Overrun));
            } else if b.utilization() >= threshold {
                prop_assert!(kinds.contains(&AlertKind::Warning));
            } else {
                prop_assert!(kinds.is_empty());
            }
        }
    }
}
