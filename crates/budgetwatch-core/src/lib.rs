//! # BudgetWatch
//!
//! Budget threshold monitoring and notification scheduling.
//!
//! BudgetWatch watches monthly category budgets, raises a warning when
//! spending reaches a budget's alert threshold and an overrun alert once it
//! goes over the limit. Alerts are rendered from templates, deduplicated
//! against a persistent history and scheduled through a delivery backend.
//!
//! ## Architecture
//!
//! - **Alerting**: threshold detection, templates, history and the monitor
//! - **Delivery**: webhook and log-only notification backends
//! - **Storage**: memory, file and Redis key-value stores for history
//! - **Source**: where the monitor reads fresh budget snapshots from
//!
//! ## Quick Start
//!
//! ```bash
//! # Check every budget in a file once
//! budgetwatch check budgets.json
//!
//! # Keep checking on an interval
//! budgetwatch watch budgets.json --interval 5m
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod config;
pub mod delivery;
pub mod error;
pub mod models;
pub mod source;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{CheckOutcome, Monitor, NotificationHistory};
    pub use crate::config::Config;
    pub use crate::delivery::{NotificationDelivery, ScheduleId};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::source::BudgetSource;
    pub use crate::storage::KeyValueStore;
}
