//! Notification template models

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Days, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::alert::AlertKind;

/// A value that can be substituted into a template placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PlaceholderValue {
    /// Plain text
    Text(String),
    /// Whole number
    Integer(i64),
    /// Decimal number, rendered as-is
    Number(f64),
    /// Money amount, rendered with a dollar sign and two decimals
    Currency(f64),
    /// Percentage (0-100 scale), rendered without decimals
    Percent(f64),
}

/// Absorbs float error such as `0.95 * 100.0 == 94.999...`
const PERCENT_EPSILON: f64 = 1e-9;

impl std::fmt::Display for PlaceholderValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaceholderValue::Text(s) => f.write_str(s),
            PlaceholderValue::Integer(n) => write!(f, "{n}"),
            PlaceholderValue::Number(n) => write!(f, "{n}"),
            PlaceholderValue::Currency(amount) => write!(f, "${amount:.2}"),
            // Truncated so 99.6% never reads as a full budget
            PlaceholderValue::Percent(pct) => write!(f, "{}", (pct + PERCENT_EPSILON).floor()),
        }
    }
}

impl From<&str> for PlaceholderValue {
    fn from(value: &str) -> Self {
        PlaceholderValue::Text(value.to_string())
    }
}

impl From<String> for PlaceholderValue {
    fn from(value: String) -> Self {
        PlaceholderValue::Text(value)
    }
}

impl From<i64> for PlaceholderValue {
    fn from(value: i64) -> Self {
        PlaceholderValue::Integer(value)
    }
}

/// Title/body templates plus the values for their placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateContent {
    /// Title with `{name}` placeholders
    pub title_template: String,
    /// Body with `{name}` placeholders
    pub body_template: String,
    /// Placeholder values keyed by name
    #[serde(default)]
    pub placeholders: BTreeMap<String, PlaceholderValue>,
}

/// How often a scheduled notification repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    /// Fire once
    #[default]
    None,
    /// Every day
    Daily,
    /// Every week
    Weekly,
    /// Every month
    Monthly,
}

impl Repeat {
    /// Whether the notification fires more than once
    pub fn repeats(self) -> bool {
        !matches!(self, Repeat::None)
    }
}

/// Calendar components a scheduled notification fires on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSpec {
    /// Hour of day (0-23, UTC)
    pub hour: u32,
    /// Minute of hour (0-59)
    pub minute: u32,
    /// ISO weekday, 1 = Monday
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday: Option<u32>,
    /// Day of month (1-31)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

impl CalendarSpec {
    /// Fire every day at the given time
    pub fn daily_at(hour: u32, minute: u32) -> Self {
        Self {
            hour,
            minute,
            weekday: None,
            day: None,
        }
    }

    /// Describe every out-of-range component
    pub fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.hour > 23 {
            errors.push(format!("calendar hour out of range: {}", self.hour));
        }
        if self.minute > 59 {
            errors.push(format!("calendar minute out of range: {}", self.minute));
        }
        if let Some(weekday) = self.weekday {
            if !(1..=7).contains(&weekday) {
                errors.push(format!("calendar weekday out of range: {weekday}"));
            }
        }
        if let Some(day) = self.day {
            if !(1..=31).contains(&day) {
                errors.push(format!("calendar day out of range: {day}"));
            }
        }

        errors
    }

    /// Next instant strictly after `after` that matches every component.
    ///
    /// Searches a little over one year ahead; a spec such as "31st that is a
    /// Monday" may legitimately have no match in that span.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.violations().is_empty() {
            return None;
        }

        let start = after.date_naive();
        for offset in 0..=400u64 {
            let date = start.checked_add_days(Days::new(offset))?;

            if self.weekday.is_some_and(|w| date.weekday().number_from_monday() != w) {
                continue;
            }
            if self.day.is_some_and(|d| date.day() != d) {
                continue;
            }

            let naive = date.and_hms_opt(self.hour, self.minute, 0)?;
            let candidate = Utc.from_utc_datetime(&naive);
            if candidate > after {
                return Some(candidate);
            }
        }

        None
    }
}

/// When a notification should be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Deliver right away
    Immediate,
    /// Deliver after a delay
    Delayed {
        #[serde(default)]
        seconds: Option<u64>,
    },
    /// Deliver on calendar components, optionally repeating
    Scheduled {
        #[serde(default)]
        calendar: Option<CalendarSpec>,
        #[serde(default)]
        repeat: Repeat,
    },
}

/// Delivery timing of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTiming {
    /// Trigger condition
    pub trigger: Trigger,
}

impl NotificationTiming {
    /// Deliver immediately
    pub fn immediate() -> Self {
        Self {
            trigger: Trigger::Immediate,
        }
    }

    /// Deliver after `seconds`
    pub fn delayed(seconds: u64) -> Self {
        Self {
            trigger: Trigger::Delayed {
                seconds: Some(seconds),
            },
        }
    }

    /// Deliver on a calendar spec
    pub fn scheduled(calendar: CalendarSpec, repeat: Repeat) -> Self {
        Self {
            trigger: Trigger::Scheduled {
                calendar: Some(calendar),
                repeat,
            },
        }
    }
}

/// A notification ready to be validated, rendered and scheduled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    /// Unique per instance
    pub id: Uuid,
    /// Alert kind this template was built for
    pub kind: AlertKind,
    /// Alert threshold (0-1) of the source budget, used in identifiers
    #[serde(default)]
    pub alert_threshold: Option<f64>,
    /// Text content
    pub content: TemplateContent,
    /// Delivery timing
    pub timing: NotificationTiming,
}

impl NotificationTemplate {
    /// Create a template with a fresh instance id
    pub fn new(kind: AlertKind, content: TemplateContent, timing: NotificationTiming) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            alert_threshold: None,
            content,
            timing,
        }
    }
}

/// Rendered title and body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedNotification {
    /// Rendered title
    pub title: String,
    /// Rendered body
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_placeholder_display() {
        assert_eq!(PlaceholderValue::Currency(25.0).to_string(), "$25.00");
        assert_eq!(PlaceholderValue::Percent(91.666).to_string(), "91");
        assert_eq!(PlaceholderValue::Percent(99.6).to_string(), "99");
        assert_eq!(PlaceholderValue::Percent(0.95 * 100.0).to_string(), "95");
        assert_eq!(PlaceholderValue::Percent(0.29 * 100.0).to_string(), "29");
        assert_eq!(PlaceholderValue::Integer(80).to_string(), "80");
        assert_eq!(PlaceholderValue::from("Dining").to_string(), "Dining");
    }

    #[test]
    fn test_daily_next_after_same_day() {
        let spec = CalendarSpec::daily_at(18, 30);
        let next = spec.next_after(at(2024, 3, 5, 9, 0)).unwrap();
        assert_eq!(next, at(2024, 3, 5, 18, 30));
    }

    #[test]
    fn test_daily_next_after_rolls_over() {
        let spec = CalendarSpec::daily_at(8, 0);
        let next = spec.next_after(at(2024, 3, 5, 8, 0)).unwrap();
        assert_eq!(next, at(2024, 3, 6, 8, 0));
    }

    #[test]
    fn test_weekly_next_after() {
        // 2024-03-05 is a Tuesday
        let spec = CalendarSpec {
            hour: 9,
            minute: 15,
            weekday: Some(1),
            day: None,
        };
        let next = spec.next_after(at(2024, 3, 5, 12, 0)).unwrap();
        assert_eq!(next, at(2024, 3, 11, 9, 15));
        assert_eq!(next.minute(), 15);
    }

    #[test]
    fn test_monthly_next_after_skips_short_months() {
        let spec = CalendarSpec {
            hour: 0,
            minute: 0,
            weekday: None,
            day: Some(31),
        };
        let next = spec.next_after(at(2024, 4, 1, 0, 0)).unwrap();
        assert_eq!(next, at(2024, 5, 31, 0, 0));
    }

    #[test]
    fn test_invalid_spec_has_no_next() {
        let spec = CalendarSpec::daily_at(25, 0);
        assert_eq!(spec.violations().len(), 1);
        assert!(spec.next_after(at(2024, 1, 1, 0, 0)).is_none());
    }

    #[test]
    fn test_trigger_serde_shape() {
        let json = serde_json::to_value(NotificationTiming::delayed(3600)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"trigger": {"type": "delayed", "seconds": 3600}})
        );

        let timing: NotificationTiming =
            serde_json::from_value(serde_json::json!({"trigger": {"type": "scheduled"}})).unwrap();
        assert_eq!(
            timing.trigger,
            Trigger::Scheduled {
                calendar: None,
                repeat: Repeat::None
            }
        );
    }
}
