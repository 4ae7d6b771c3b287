//! Template rendering, validation and identifier generation
//!
//! Templates use a tiny placeholder grammar: `{name}` where `name` is an
//! ASCII identifier. Rendering never fails; tokens without a value are left in
//! place so that [`validate`] can report them explicitly.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::{
    AlertKind, Budget, NotificationTemplate, NotificationTiming, PlaceholderValue,
    RecommendationKind, RenderedNotification, TemplateContent, Trigger,
};

/// Delay applied to recommendation notifications
pub const RECOMMENDATION_DELAY_SECS: u64 = 3600;

static PLACEHOLDER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Substitute every known `{name}` token in `text`
pub fn render_text(text: &str, placeholders: &BTreeMap<String, PlaceholderValue>) -> String {
    PLACEHOLDER_TOKEN
        .replace_all(text, |caps: &Captures<'_>| match placeholders.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Render title and body of a template
pub fn render(template: &NotificationTemplate) -> RenderedNotification {
    let content = &template.content;
    RenderedNotification {
        title: render_text(&content.title_template, &content.placeholders),
        body: render_text(&content.body_template, &content.placeholders),
    }
}

/// Placeholder names referenced by title and body, in order of first use
pub fn referenced_placeholders(content: &TemplateContent) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for text in [&content.title_template, &content.body_template] {
        for caps in PLACEHOLDER_TOKEN.captures_iter(text) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }

    names
}

/// Every problem that would make a template unsafe to schedule
pub fn validation_errors(template: &NotificationTemplate) -> Vec<String> {
    let mut errors: Vec<String> = referenced_placeholders(&template.content)
        .into_iter()
        .filter(|name| !template.content.placeholders.contains_key(name))
        .map(|name| format!("missing placeholder: {{{name}}}"))
        .collect();

    match template.timing.trigger {
        Trigger::Immediate => {}
        Trigger::Delayed { seconds: None } => {
            errors.push("delayed timing requires a delay in seconds".to_string());
        }
        Trigger::Delayed { seconds: Some(0) } => {
            errors.push("delayed timing requires a delay of at least 1 second".to_string());
        }
        Trigger::Delayed { .. } => {}
        Trigger::Scheduled { calendar: None, .. } => {
            errors.push("scheduled timing requires a calendar spec".to_string());
        }
        Trigger::Scheduled {
            calendar: Some(spec),
            ..
        } => errors.extend(spec.violations()),
    }

    errors
}

/// Validate a template, collecting every violation
pub fn validate(template: &NotificationTemplate) -> Result<()> {
    let errors = validation_errors(template);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidTemplate { errors })
    }
}

/// Stable per-kind prefix of a delivery identifier
fn kind_tag(template: &NotificationTemplate) -> String {
    match template.kind {
        AlertKind::Warning => {
            let threshold = template.alert_threshold.unwrap_or(0.0);
            format!("budgetWarning_{}", (threshold * 100.0).round() as i64)
        }
        AlertKind::Overrun => "budgetOverrun".to_string(),
        AlertKind::Recommendation(kind) => format!("spendingRecommendation_{}", kind.tag()),
    }
}

/// Replace non-alphanumerics with `_`, collapse runs and trim the ends
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    out.trim_matches('_').to_string()
}

fn stable_hash(raw: &str) -> u64 {
    let digest = Sha256::digest(raw.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Sanitize `raw`, falling back to a hash-derived id when nothing survives
pub fn identifier_from_raw(raw: &str) -> String {
    let sanitized = sanitize_identifier(raw);
    if sanitized.is_empty() {
        format!("budget_{}", stable_hash(raw))
    } else {
        sanitized
    }
}

/// Delivery-safe identifier derived from the template kind and instance id
pub fn generate_identifier(template: &NotificationTemplate) -> String {
    identifier_from_raw(&format!("{}_{}", kind_tag(template), template.id))
}

fn budget_placeholders(budget: &Budget) -> BTreeMap<String, PlaceholderValue> {
    let mut map = BTreeMap::new();
    map.insert("category".to_string(), budget.category.display_name().into());
    map.insert("icon".to_string(), budget.category.icon().into());
    map.insert(
        "percentage".to_string(),
        PlaceholderValue::Percent(budget.utilization_percent()),
    );
    map.insert(
        "threshold".to_string(),
        PlaceholderValue::Percent(budget.alert_threshold * 100.0),
    );
    map.insert("remaining".to_string(), PlaceholderValue::Currency(budget.remaining()));
    map.insert("overrun".to_string(), PlaceholderValue::Currency(budget.overrun()));
    map.insert("spent".to_string(), PlaceholderValue::Currency(budget.current_spent));
    map.insert("limit".to_string(), PlaceholderValue::Currency(budget.monthly_limit));
    map
}

fn budget_template(
    budget: &Budget,
    kind: AlertKind,
    title: &str,
    body: &str,
    timing: NotificationTiming,
) -> NotificationTemplate {
    let content = TemplateContent {
        title_template: title.to_string(),
        body_template: body.to_string(),
        placeholders: budget_placeholders(budget),
    };

    let mut template = NotificationTemplate::new(kind, content, timing);
    template.alert_threshold = Some(budget.alert_threshold);
    template
}

/// Template for a budget that reached its alert threshold
pub fn warning_template(budget: &Budget) -> NotificationTemplate {
    budget_template(
        budget,
        AlertKind::Warning,
        "{icon} {category} Budget Alert",
        "You've used {percentage}% of your {category} budget. {remaining} remaining this month.",
        NotificationTiming::immediate(),
    )
}

/// Template for a budget that went over its limit
pub fn overrun_template(budget: &Budget) -> NotificationTemplate {
    budget_template(
        budget,
        AlertKind::Overrun,
        "{icon} {category} Budget Exceeded",
        "You're {overrun} over your {category} budget, with {spent} spent of {limit}.",
        NotificationTiming::immediate(),
    )
}

/// Template for an explicitly requested spending recommendation
pub fn recommendation_template(budget: &Budget, kind: RecommendationKind) -> NotificationTemplate {
    let (title, body) = match kind {
        RecommendationKind::ReduceSpending => (
            "💡 Slow down on {category}",
            "You've already used {percentage}% of your {category} budget. \
             Trimming spending now stretches the remaining {remaining} to month end.",
        ),
        RecommendationKind::CategoryReallocation => (
            "💡 Rebalance your {category} budget",
            "{category} is at {percentage}% of its {limit} limit. \
             Consider moving funds from a category with room to spare.",
        ),
        RecommendationKind::SavingsOpportunity => (
            "💡 Savings opportunity in {category}",
            "You've used {percentage}% of your {category} budget. \
             Keep the remaining {remaining} unspent and move it to savings.",
        ),
    };

    budget_template(
        budget,
        AlertKind::Recommendation(kind),
        title,
        body,
        NotificationTiming::delayed(RECOMMENDATION_DELAY_SECS),
    )
}

/// Build the template matching an alert kind
pub fn template_for(budget: &Budget, kind: AlertKind) -> NotificationTemplate {
    match kind {
        AlertKind::Warning => warning_template(budget),
        AlertKind::Overrun => overrun_template(budget),
        AlertKind::Recommendation(kind) => recommendation_template(budget, kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CalendarSpec, Category, Repeat};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn content(title: &str, body: &str, values: &[(&str, PlaceholderValue)]) -> TemplateContent {
        TemplateContent {
            title_template: title.to_string(),
            body_template: body.to_string(),
            placeholders: values
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_render_substitutes_and_keeps_unknown_tokens() {
        let template = NotificationTemplate::new(
            AlertKind::Warning,
            content(
                "{category} alert",
                "{percentage}% used, {unknown} stays, {not a token}",
                &[
                    ("category", "Dining".into()),
                    ("percentage", PlaceholderValue::Percent(92.0)),
                ],
            ),
            NotificationTiming::immediate(),
        );

        let rendered = render(&template);
        assert_eq!(rendered.title, "Dining alert");
        assert_eq!(rendered.body, "92% used, {unknown} stays, {not a token}");
    }

    #[test]
    fn test_validate_reports_every_missing_placeholder() {
        let template = NotificationTemplate::new(
            AlertKind::Overrun,
            content("{a} {b}", "{b} {c}", &[("b", "x".into())]),
            NotificationTiming::immediate(),
        );

        assert_eq!(
            validation_errors(&template),
            vec!["missing placeholder: {a}".to_string(), "missing placeholder: {c}".to_string()]
        );
        assert!(matches!(validate(&template), Err(Error::InvalidTemplate { .. })));
    }

    #[test]
    fn test_validate_scheduled_without_calendar() {
        let mut template = warning_template(&Budget::new("b", Category::Dining, 100.0, 90.0));
        template.timing.trigger = Trigger::Scheduled {
            calendar: None,
            repeat: Repeat::Weekly,
        };

        let errors = validation_errors(&template);
        assert_eq!(errors, vec!["scheduled timing requires a calendar spec".to_string()]);
    }

    #[test]
    fn test_validate_collects_timing_and_placeholder_errors() {
        let template = NotificationTemplate::new(
            AlertKind::Warning,
            content("{missing}", "body", &[]),
            NotificationTiming {
                trigger: Trigger::Delayed { seconds: None },
            },
        );

        assert_eq!(validation_errors(&template).len(), 2);
    }

    #[test]
    fn test_validate_rejects_invalid_calendar_and_zero_delay() {
        let budget = Budget::new("b", Category::Dining, 100.0, 90.0);

        let mut scheduled = warning_template(&budget);
        scheduled.timing = NotificationTiming::scheduled(CalendarSpec::daily_at(9, 75), Repeat::Daily);
        assert_eq!(validation_errors(&scheduled), vec!["calendar minute out of range: 75".to_string()]);

        let mut delayed = warning_template(&budget);
        delayed.timing = NotificationTiming::delayed(0);
        assert_eq!(validation_errors(&delayed).len(), 1);
    }

    #[test]
    fn test_factory_templates_are_valid() {
        let budget = Budget::new("b", Category::Groceries, 300.0, 275.0);

        assert!(validate(&warning_template(&budget)).is_ok());
        assert!(validate(&overrun_template(&budget)).is_ok());
        for kind in RecommendationKind::ALL {
            assert!(validate(&recommendation_template(&budget, kind)).is_ok());
        }
    }

    #[test]
    fn test_warning_template_scenario() {
        let budget = Budget::new("groceries", Category::Groceries, 300.0, 275.0).with_threshold(0.8);
        let template = warning_template(&budget);
        let rendered = render(&template);

        assert_eq!(template.timing, NotificationTiming::immediate());
        assert_eq!(rendered.title, "🛒 Groceries Budget Alert");
        assert_eq!(
            rendered.body,
            "You've used 91% of your Groceries budget. $25.00 remaining this month."
        );
    }

    #[test]
    fn test_overrun_template_scenario() {
        let budget = Budget::new("dining", Category::Dining, 300.0, 305.0);
        let rendered = render(&overrun_template(&budget));

        assert_eq!(
            rendered.body,
            "You're $5.00 over your Dining Out budget, with $305.00 spent of $300.00."
        );
    }

    #[test]
    fn test_savings_recommendation_scenario() {
        let budget = Budget::new("fun", Category::Entertainment, 500.0, 475.0);
        let template = recommendation_template(&budget, RecommendationKind::SavingsOpportunity);
        let rendered = render(&template);

        assert!(rendered.body.contains("95"));
        assert!(rendered.body.contains("25.00"));
        assert_eq!(template.timing, NotificationTiming::delayed(3600));
    }

    #[test]
    fn test_identifier_tags() {
        let budget = Budget::new("b", Category::Dining, 100.0, 90.0).with_threshold(0.75);

        let warning = warning_template(&budget);
        assert!(generate_identifier(&warning).starts_with("budgetWarning_75_"));

        let overrun = overrun_template(&budget);
        assert!(generate_identifier(&overrun).starts_with("budgetOverrun_"));

        let rec = recommendation_template(&budget, RecommendationKind::ReduceSpending);
        assert!(generate_identifier(&rec).starts_with("spendingRecommendation_reduceSpending_"));
    }

    #[test]
    fn test_identifier_is_deterministic_per_instance() {
        let budget = Budget::new("b", Category::Dining, 100.0, 90.0);
        let template = warning_template(&budget);

        assert_eq!(generate_identifier(&template), generate_identifier(&template.clone()));
        assert_ne!(
            generate_identifier(&template),
            generate_identifier(&warning_template(&budget))
        );
    }

    #[test]
    fn test_sanitize_collapses_and_trims() {
        assert_eq!(sanitize_identifier("--a..b__c--"), "a_b_c");
        assert_eq!(sanitize_identifier("héllo wörld"), "h_llo_w_rld");
        assert_eq!(sanitize_identifier("!!!"), "");
    }

    #[test]
    fn test_empty_identifier_falls_back_to_hash() {
        let id = identifier_from_raw("!!! ???");
        assert!(id.starts_with("budget_"));
        assert!(id.len() > "budget_".len());
        assert_eq!(id, identifier_from_raw("!!! ???"));
        assert_ne!(id, identifier_from_raw("***"));
    }

    proptest! {
        #[test]
        fn identifiers_are_safe_and_non_empty(raw in ".*") {
            let id = identifier_from_raw(&raw);

            prop_assert!(!id.is_empty());
            prop_assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            prop_assert!(!id.contains("__"));
            prop_assert_eq!(id.clone(), identifier_from_raw(&raw));
        }
    }
}
