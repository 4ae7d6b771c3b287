//! Alerting system for BudgetWatch
//!
//! Detects threshold crossings, renders notification templates, deduplicates
//! through a persistent history and hands the result to a delivery backend.

pub mod detector;
mod guard;
mod history;
mod monitor;
pub mod template;

pub use guard::{InFlightGuard, InFlightRegistry};
pub use history::{HistoryEntry, NotificationHistory};
pub use monitor::{CheckOutcome, EvaluationReport, KindFailure, Monitor, ScheduledAlert, SweepSummary};
