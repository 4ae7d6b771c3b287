//! Notification delivery seam
//!
//! The engine never talks to a notification backend directly; it asks a
//! [`NotificationDelivery`] to schedule rendered notifications and keeps the
//! returned [`ScheduleId`] so they can be cancelled later.

mod webhook;

pub use webhook::WebhookDelivery;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Error;
use crate::models::{CalendarSpec, Repeat};

/// Opaque handle for a scheduled notification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(String);

impl ScheduleId {
    /// Wrap a backend-provided handle
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw handle
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery errors
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

impl From<DeliveryError> for Error {
    fn from(err: DeliveryError) -> Self {
        Error::SchedulingFailed(err.to_string())
    }
}

/// Capability set of a notification backend
#[async_trait]
pub trait NotificationDelivery: Send + Sync {
    /// Ask for (or confirm) authorization to post notifications
    async fn request_permission(&self) -> Result<bool, DeliveryError>;

    /// Deliver now
    async fn schedule_immediate(
        &self,
        id: &str,
        title: &str,
        body: &str,
    ) -> Result<ScheduleId, DeliveryError>;

    /// Deliver after `seconds`
    async fn schedule_after_delay(
        &self,
        id: &str,
        title: &str,
        body: &str,
        seconds: u64,
    ) -> Result<ScheduleId, DeliveryError>;

    /// Deliver on calendar components, repeating per `repeat`
    async fn schedule_repeating(
        &self,
        id: &str,
        title: &str,
        body: &str,
        calendar: &CalendarSpec,
        repeat: Repeat,
    ) -> Result<ScheduleId, DeliveryError>;

    /// Cancel a pending notification; unknown ids are ignored
    async fn cancel(&self, schedule_id: &ScheduleId) -> Result<(), DeliveryError>;
}

/// Dry-run delivery that only logs what would be sent
#[derive(Debug, Clone, Default)]
pub struct LogDelivery;

impl LogDelivery {
    /// Create a log-only delivery
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDelivery for LogDelivery {
    async fn request_permission(&self) -> Result<bool, DeliveryError> {
        Ok(true)
    }

    async fn schedule_immediate(
        &self,
        id: &str,
        title: &str,
        body: &str,
    ) -> Result<ScheduleId, DeliveryError> {
        info!(notification_id = id, title, body, "Notification (immediate)");
        Ok(ScheduleId::new(id))
    }

    async fn schedule_after_delay(
        &self,
        id: &str,
        title: &str,
        body: &str,
        seconds: u64,
    ) -> Result<ScheduleId, DeliveryError> {
        info!(notification_id = id, title, body, delay_secs = seconds, "Notification (delayed)");
        Ok(ScheduleId::new(id))
    }

    async fn schedule_repeating(
        &self,
        id: &str,
        title: &str,
        body: &str,
        calendar: &CalendarSpec,
        repeat: Repeat,
    ) -> Result<ScheduleId, DeliveryError> {
        info!(
            notification_id = id,
            title,
            body,
            calendar = ?calendar,
            repeat = ?repeat,
            "Notification (scheduled)"
        );
        Ok(ScheduleId::new(id))
    }

    async fn cancel(&self, schedule_id: &ScheduleId) -> Result<(), DeliveryError> {
        info!(schedule_id = %schedule_id, "Notification cancelled");
        Ok(())
    }
}
