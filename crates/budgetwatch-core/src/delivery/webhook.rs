//! Webhook notification delivery
//!
//! Immediate notifications are posted inline so failures reach the caller.
//! Delayed and calendar notifications run as tokio tasks that can be
//! cancelled through their schedule id until they fire.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::Client;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::models::{CalendarSpec, Repeat};

use super::{DeliveryError, NotificationDelivery, ScheduleId};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    notification_id: &'a str,
    title: &'a str,
    body: &'a str,
    sent_at: DateTime<Utc>,
}

#[derive(Clone)]
struct Poster {
    client: Client,
    url: Arc<str>,
}

impl Poster {
    async fn post(&self, id: &str, title: &str, body: &str) -> Result<(), DeliveryError> {
        let payload = WebhookPayload {
            notification_id: id,
            title,
            body,
            sent_at: Utc::now(),
        };

        let response = self
            .client
            .post(&*self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::HttpError(format!(
                "Webhook returned {}: {}",
                status, body
            )));
        }

        info!(notification_id = id, url = %self.url, "Webhook notification sent");
        Ok(())
    }
}

/// Posts notifications as JSON to a webhook
pub struct WebhookDelivery {
    poster: Poster,
    pending: Arc<DashMap<ScheduleId, JoinHandle<()>>>,
}

impl WebhookDelivery {
    /// Create a delivery for `url`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let url = url.into();
        reqwest::Url::parse(&url)
            .map_err(|e| DeliveryError::ConfigError(format!("invalid webhook url {url:?}: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::ConfigError(e.to_string()))?;

        Ok(Self {
            poster: Poster {
                client,
                url: url.into(),
            },
            pending: Arc::new(DashMap::new()),
        })
    }

    /// Number of delayed or calendar notifications not yet fired
    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|entry| !entry.value().is_finished()).count()
    }

    fn spawn_pending<F>(&self, id: &str, task: F) -> ScheduleId
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let schedule_id = ScheduleId::new(id);
        let pending = Arc::clone(&self.pending);
        let key = schedule_id.clone();

        let handle = tokio::spawn(async move {
            task.await;
            pending.remove(&key);
        });

        if let Some(previous) = self.pending.insert(schedule_id.clone(), handle) {
            previous.abort();
        }
        schedule_id
    }
}

#[async_trait]
impl NotificationDelivery for WebhookDelivery {
    async fn request_permission(&self) -> Result<bool, DeliveryError> {
        Ok(true)
    }

    async fn schedule_immediate(
        &self,
        id: &str,
        title: &str,
        body: &str,
    ) -> Result<ScheduleId, DeliveryError> {
        self.poster.post(id, title, body).await?;
        Ok(ScheduleId::new(id))
    }

    async fn schedule_after_delay(
        &self,
        id: &str,
        title: &str,
        body: &str,
        seconds: u64,
    ) -> Result<ScheduleId, DeliveryError> {
        if seconds == 0 {
            return Err(DeliveryError::InvalidSchedule("delay must be at least 1 second".to_string()));
        }

        let poster = self.poster.clone();
        let (task_id, title, body) = (id.to_string(), title.to_string(), body.to_string());

        let schedule_id = self.spawn_pending(id, async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            if let Err(e) = poster.post(&task_id, &title, &body).await {
                error!(notification_id = %task_id, error = %e, "Delayed webhook notification failed");
            }
        });

        debug!(schedule_id = %schedule_id, delay_secs = seconds, "Scheduled delayed notification");
        Ok(schedule_id)
    }

    async fn schedule_repeating(
        &self,
        id: &str,
        title: &str,
        body: &str,
        calendar: &CalendarSpec,
        repeat: Repeat,
    ) -> Result<ScheduleId, DeliveryError> {
        let calendar = *calendar;
        if calendar.next_after(Utc::now()).is_none() {
            return Err(DeliveryError::InvalidSchedule(format!(
                "calendar spec never fires: {calendar:?}"
            )));
        }

        let poster = self.poster.clone();
        let (task_id, title, body) = (id.to_string(), title.to_string(), body.to_string());

        let schedule_id = self.spawn_pending(id, async move {
            while let Some(next) = calendar.next_after(Utc::now()) {
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                if let Err(e) = poster.post(&task_id, &title, &body).await {
                    error!(notification_id = %task_id, error = %e, "Scheduled webhook notification failed");
                }
                if !repeat.repeats() {
                    break;
                }
            }
        });

        debug!(schedule_id = %schedule_id, repeat = ?repeat, "Scheduled calendar notification");
        Ok(schedule_id)
    }

    async fn cancel(&self, schedule_id: &ScheduleId) -> Result<(), DeliveryError> {
        match self.pending.remove(schedule_id) {
            Some((_, handle)) => {
                handle.abort();
                info!(schedule_id = %schedule_id, "Cancelled pending notification");
            }
            None => debug!(schedule_id = %schedule_id, "Nothing pending to cancel"),
        }
        Ok(())
    }
}

impl Drop for WebhookDelivery {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.value().abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn delivery(server: &MockServer) -> WebhookDelivery {
        WebhookDelivery::new(format!("{}/notify", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_immediate_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .and(body_partial_json(serde_json::json!({
                "notification_id": "budgetOverrun_abc",
                "title": "Over",
                "body": "You are over",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let delivery = delivery(&server).await;
        let id = delivery
            .schedule_immediate("budgetOverrun_abc", "Over", "You are over")
            .await
            .unwrap();

        assert_eq!(id.as_str(), "budgetOverrun_abc");
    }

    #[tokio::test]
    async fn test_immediate_surfaces_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let delivery = delivery(&server).await;
        let err = delivery.schedule_immediate("id", "t", "b").await.unwrap_err();

        assert!(matches!(err, DeliveryError::HttpError(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_cancel_pending_delay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let delivery = delivery(&server).await;
        let id = delivery.schedule_after_delay("rec", "t", "b", 3600).await.unwrap();
        assert_eq!(delivery.pending_count(), 1);

        delivery.cancel(&id).await.unwrap();
        assert_eq!(delivery.pending_count(), 0);

        // Unknown ids are ignored
        delivery.cancel(&ScheduleId::new("missing")).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_zero_delay() {
        let server = MockServer::start().await;
        let delivery = delivery(&server).await;

        assert!(matches!(
            delivery.schedule_after_delay("id", "t", "b", 0).await,
            Err(DeliveryError::InvalidSchedule(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_calendar_that_never_fires() {
        let server = MockServer::start().await;
        let delivery = delivery(&server).await;
        let calendar = CalendarSpec::daily_at(24, 0);

        let result = delivery
            .schedule_repeating("id", "t", "b", &calendar, Repeat::Daily)
            .await;
        assert!(matches!(result, Err(DeliveryError::InvalidSchedule(_))));
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            WebhookDelivery::new("not a url", Duration::from_secs(1)),
            Err(DeliveryError::ConfigError(_))
        ));
    }
}
