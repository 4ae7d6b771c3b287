//! Budget monitor: drives threshold checks and schedules notifications

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{Config, MonitorConfig};
use crate::delivery::{LogDelivery, NotificationDelivery, ScheduleId, WebhookDelivery};
use crate::error::{Error, Result};
use crate::models::{AlertKind, Budget, NotificationTemplate, RecommendationKind, RenderedNotification, Trigger};
use crate::source::BudgetSource;
use crate::storage;

use super::detector;
use super::guard::InFlightRegistry;
use super::history::NotificationHistory;
use super::template;

/// A notification handed to the delivery subsystem
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledAlert {
    /// Alert kind
    pub kind: AlertKind,
    /// Identifier passed to the delivery subsystem
    pub notification_id: String,
    /// Handle returned by the delivery subsystem
    pub schedule_id: ScheduleId,
    /// Rendered text
    pub rendered: RenderedNotification,
}

/// A kind that fired but could not be scheduled
#[derive(Debug)]
pub struct KindFailure {
    /// Alert kind
    pub kind: AlertKind,
    /// What went wrong
    pub error: Error,
}

/// Result of evaluating one budget
#[derive(Debug, Default)]
pub struct EvaluationReport {
    /// Budget evaluated
    pub budget_id: String,
    /// Kinds the detector raised
    pub fired: Vec<AlertKind>,
    /// Kinds scheduled during this evaluation
    pub scheduled: Vec<ScheduledAlert>,
    /// Kinds skipped because of the dedup window
    pub suppressed: Vec<AlertKind>,
    /// Kinds that failed validation or scheduling
    pub failures: Vec<KindFailure>,
}

/// Outcome of a status check
#[derive(Debug)]
pub enum CheckOutcome {
    /// The budget is not monitored; nothing happened
    NotMonitored,
    /// Another evaluation of the budget is running; nothing happened
    AlreadyInFlight,
    /// The budget was evaluated
    Evaluated(EvaluationReport),
}

impl CheckOutcome {
    /// The evaluation report, if an evaluation ran
    pub fn report(&self) -> Option<&EvaluationReport> {
        match self {
            CheckOutcome::Evaluated(report) => Some(report),
            _ => None,
        }
    }
}

/// Totals of one sweep over every monitored budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Budgets considered
    pub checked: usize,
    /// Budgets evaluated
    pub evaluated: usize,
    /// Budgets skipped (in flight or stopped mid-sweep)
    pub skipped: usize,
    /// Budgets the source no longer knows
    pub missing: usize,
    /// Budgets whose fetch or evaluation failed
    pub failed: usize,
    /// Notifications scheduled
    pub scheduled: usize,
    /// Per-kind failures
    pub kind_failures: usize,
}

/// Builds the notification template for one alert kind
type TemplateFactory = fn(&Budget, AlertKind) -> NotificationTemplate;

/// Watches budgets and schedules threshold notifications
pub struct Monitor {
    delivery: Arc<dyn NotificationDelivery>,
    history: Arc<NotificationHistory>,
    in_flight: InFlightRegistry,
    /// Claimed "<budget>|<kind>" slots of recommendations being scheduled
    recommending: InFlightRegistry,
    templates: TemplateFactory,
    /// Budgets under observation
    monitored: RwLock<HashSet<String>>,
    /// Last schedule id per (budget, kind), kept for cancellation
    schedules: RwLock<HashMap<(String, AlertKind), ScheduleId>>,
    config: MonitorConfig,
}

impl Monitor {
    /// Create a monitor
    pub fn new(
        delivery: Arc<dyn NotificationDelivery>,
        history: Arc<NotificationHistory>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            delivery,
            history,
            in_flight: InFlightRegistry::new(),
            recommending: InFlightRegistry::new(),
            templates: template::template_for,
            monitored: RwLock::new(HashSet::new()),
            schedules: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Build a monitor with the storage and delivery selected by `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = storage::open(&config.history).await?;
        let history = NotificationHistory::load(store, &config.history, Utc::now()).await;

        let delivery: Arc<dyn NotificationDelivery> = match &config.delivery.webhook_url {
            Some(url) => Arc::new(WebhookDelivery::new(url.clone(), config.delivery.timeout)?),
            None => {
                info!("No webhook configured, notifications will only be logged");
                Arc::new(LogDelivery::new())
            }
        };

        Ok(Self::new(delivery, Arc::new(history), config.monitor.clone()))
    }

    #[cfg(test)]
    fn with_templates(mut self, templates: TemplateFactory) -> Self {
        self.templates = templates;
        self
    }

    /// The notification history
    pub fn history(&self) -> &Arc<NotificationHistory> {
        &self.history
    }

    /// Whether `budget_id` is monitored
    pub async fn is_monitored(&self, budget_id: &str) -> bool {
        self.monitored.read().await.contains(budget_id)
    }

    /// Ids of every monitored budget, sorted
    pub async fn monitored_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.monitored.read().await.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether an evaluation of `budget_id` is running
    pub fn is_in_flight(&self, budget_id: &str) -> bool {
        self.in_flight.is_in_flight(budget_id)
    }

    /// Last schedule id stored for (budget, kind)
    pub async fn schedule_id(&self, budget_id: &str, kind: AlertKind) -> Option<ScheduleId> {
        self.schedules
            .read()
            .await
            .get(&(budget_id.to_string(), kind))
            .cloned()
    }

    /// Start monitoring a budget and evaluate it once
    pub async fn start_monitoring(&self, budget: &Budget) -> Result<CheckOutcome> {
        self.start_monitoring_at(budget, Utc::now()).await
    }

    /// [`Monitor::start_monitoring`] at an explicit instant
    pub async fn start_monitoring_at(&self, budget: &Budget, now: DateTime<Utc>) -> Result<CheckOutcome> {
        budget.validate()?;

        let added = self.monitored.write().await.insert(budget.id.clone());
        if added {
            info!(budget_id = %budget.id, category = %budget.category, "Started monitoring budget");
        }

        self.check_budget_status_at(budget, now).await
    }

    /// Stop monitoring a budget, cancelling its pending threshold notifications.
    ///
    /// Every stored schedule id of the budget is dropped, but recommendations
    /// already scheduled still fire. An evaluation already in flight is not
    /// interrupted.
    pub async fn stop_monitoring(&self, budget_id: &str) -> bool {
        let was_monitored = self.monitored.write().await.remove(budget_id);

        let mut dropped = Vec::new();
        self.schedules.write().await.retain(|(id, kind), schedule_id| {
            if id == budget_id {
                dropped.push((*kind, schedule_id.clone()));
                false
            } else {
                true
            }
        });

        for (kind, schedule_id) in dropped {
            if !kind.is_threshold_alert() {
                continue;
            }
            if let Err(e) = self.delivery.cancel(&schedule_id).await {
                warn!(budget_id, kind = %kind, schedule_id = %schedule_id, error = %e, "Failed to cancel notification");
            }
        }

        self.history
            .remove_where(budget_id, AlertKind::is_threshold_alert)
            .await;

        if was_monitored {
            info!(budget_id, "Stopped monitoring budget");
        }
        was_monitored
    }

    /// Check a budget and schedule any threshold notifications it needs
    pub async fn check_budget_status(&self, budget: &Budget) -> Result<CheckOutcome> {
        self.check_budget_status_at(budget, Utc::now()).await
    }

    /// [`Monitor::check_budget_status`] at an explicit instant.
    ///
    /// A second check for a budget whose evaluation is still running returns
    /// [`CheckOutcome::AlreadyInFlight`] without side effects; it is neither
    /// queued nor retried.
    pub async fn check_budget_status_at(&self, budget: &Budget, now: DateTime<Utc>) -> Result<CheckOutcome> {
        if !self.is_monitored(&budget.id).await {
            debug!(budget_id = %budget.id, "Budget not monitored, skipping check");
            return Ok(CheckOutcome::NotMonitored);
        }

        let Some(_guard) = self.in_flight.try_enter(&budget.id) else {
            debug!(budget_id = %budget.id, "Evaluation already in flight, skipping check");
            return Ok(CheckOutcome::AlreadyInFlight);
        };

        let report = self.evaluate(budget, now).await?;
        Ok(CheckOutcome::Evaluated(report))
    }

    async fn evaluate(&self, budget: &Budget, now: DateTime<Utc>) -> Result<EvaluationReport> {
        budget
            .validate()
            .map_err(|e| Error::detection_failed(&budget.id, e.to_string()))?;

        let kinds = detector::evaluate(budget);

        debug!(
            budget_id = %budget.id,
            utilization = budget.utilization(),
            threshold = budget.alert_threshold,
            fired = ?kinds,
            "Evaluated budget"
        );

        let mut report = EvaluationReport {
            budget_id: budget.id.clone(),
            ..EvaluationReport::default()
        };
        let mut permission_granted = false;

        for kind in kinds {
            report.fired.push(kind);

            match self.dispatch(budget, kind, now, &mut permission_granted).await {
                Ok(Some(scheduled)) => report.scheduled.push(scheduled),
                Ok(None) => report.suppressed.push(kind),
                Err(Error::PermissionDenied) => {
                    warn!(budget_id = %budget.id, "Notification permission denied");
                    return Err(Error::PermissionDenied);
                }
                Err(e) => {
                    error!(budget_id = %budget.id, kind = %kind, error = %e, "Failed to schedule alert");
                    report.failures.push(KindFailure { kind, error: e });
                }
            }
        }

        Ok(report)
    }

    /// Schedule one alert kind unless it was sent within the dedup window
    async fn dispatch(
        &self,
        budget: &Budget,
        kind: AlertKind,
        now: DateTime<Utc>,
        permission_granted: &mut bool,
    ) -> Result<Option<ScheduledAlert>> {
        if self
            .history
            .has_recent_entry(&budget.id, kind, now, self.config.dedup_window)
            .await
        {
            debug!(budget_id = %budget.id, kind = %kind, "Alert sent recently, suppressing");
            return Ok(None);
        }

        let template = (self.templates)(budget, kind);
        template::validate(&template)?;
        let rendered = template::render(&template);

        if !*permission_granted {
            if !self.delivery.request_permission().await? {
                return Err(Error::PermissionDenied);
            }
            *permission_granted = true;
        }

        let notification_id = template::generate_identifier(&template);
        let schedule_id = self.schedule(&template, &notification_id, &rendered).await?;

        self.schedules
            .write()
            .await
            .insert((budget.id.clone(), kind), schedule_id.clone());
        self.history.record(&budget.id, kind, now).await;

        info!(
            budget_id = %budget.id,
            kind = %kind,
            notification_id = %notification_id,
            schedule_id = %schedule_id,
            "Alert scheduled"
        );

        Ok(Some(ScheduledAlert {
            kind,
            notification_id,
            schedule_id,
            rendered,
        }))
    }

    async fn schedule(
        &self,
        template: &NotificationTemplate,
        notification_id: &str,
        rendered: &RenderedNotification,
    ) -> Result<ScheduleId> {
        let (title, body) = (rendered.title.as_str(), rendered.body.as_str());

        let schedule_id = match template.timing.trigger {
            Trigger::Immediate => {
                self.delivery
                    .schedule_immediate(notification_id, title, body)
                    .await?
            }
            Trigger::Delayed {
                seconds: Some(seconds),
            } => {
                self.delivery
                    .schedule_after_delay(notification_id, title, body, seconds)
                    .await?
            }
            Trigger::Scheduled {
                calendar: Some(calendar),
                repeat,
            } => {
                self.delivery
                    .schedule_repeating(notification_id, title, body, &calendar, repeat)
                    .await?
            }
            _ => {
                return Err(Error::InvalidTemplate {
                    errors: template::validation_errors(template),
                })
            }
        };

        Ok(schedule_id)
    }

    /// Schedule a spending recommendation for a budget.
    ///
    /// Recommendations are only sent on request, never by the check loop.
    /// Returns `None` when utilization is too low, one was sent recently or
    /// the same recommendation is being scheduled concurrently.
    pub async fn send_recommendation(
        &self,
        budget: &Budget,
        kind: RecommendationKind,
    ) -> Result<Option<ScheduledAlert>> {
        self.send_recommendation_at(budget, kind, Utc::now()).await
    }

    /// [`Monitor::send_recommendation`] at an explicit instant
    pub async fn send_recommendation_at(
        &self,
        budget: &Budget,
        kind: RecommendationKind,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledAlert>> {
        budget
            .validate()
            .map_err(|e| Error::detection_failed(&budget.id, e.to_string()))?;

        if !detector::should_recommend(budget) {
            debug!(budget_id = %budget.id, "Utilization too low for a recommendation");
            return Ok(None);
        }

        let kind = AlertKind::Recommendation(kind);
        let slot = format!("{}|{}", budget.id, kind.storage_key());
        let Some(_claim) = self.recommending.try_enter(&slot) else {
            debug!(budget_id = %budget.id, kind = %kind, "Recommendation already being scheduled");
            return Ok(None);
        };

        let mut permission_granted = false;
        self.dispatch(budget, kind, now, &mut permission_granted).await
    }

    /// Check every monitored budget, isolating per-budget failures
    pub async fn check_all_monitored_budgets(&self, source: &dyn BudgetSource) -> SweepSummary {
        self.check_all_monitored_budgets_at(source, Utc::now()).await
    }

    /// [`Monitor::check_all_monitored_budgets`] at an explicit instant
    pub async fn check_all_monitored_budgets_at(
        &self,
        source: &dyn BudgetSource,
        now: DateTime<Utc>,
    ) -> SweepSummary {
        let ids = self.monitored_ids().await;
        let concurrency = self.config.sweep_concurrency.max(1);

        let results: Vec<(String, Result<Option<CheckOutcome>>)> = stream::iter(ids)
            .map(|id| async move {
                let result = match source.fetch_budget(&id).await {
                    Ok(Some(budget)) => self.check_budget_status_at(&budget, now).await.map(Some),
                    Ok(None) => Ok(None),
                    Err(e) => Err(e),
                };
                (id, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut summary = SweepSummary {
            checked: results.len(),
            ..SweepSummary::default()
        };

        for (budget_id, result) in results {
            match result {
                Ok(Some(CheckOutcome::Evaluated(report))) => {
                    summary.evaluated += 1;
                    summary.scheduled += report.scheduled.len();
                    summary.kind_failures += report.failures.len();
                }
                Ok(Some(_)) => summary.skipped += 1,
                Ok(None) => {
                    warn!(budget_id = %budget_id, "Monitored budget not found in source");
                    summary.missing += 1;
                }
                Err(e) => {
                    error!(budget_id = %budget_id, error = %e, "Error checking budget");
                    summary.failed += 1;
                }
            }
        }

        debug!(?summary, "Completed budget sweep");
        summary
    }

    /// Sweep all monitored budgets every `every` until `shutdown` resolves
    pub async fn run<F>(&self, source: Arc<dyn BudgetSource>, every: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(interval = ?every, "Starting budget monitor");

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Budget monitor stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let summary = self.check_all_monitored_budgets(source.as_ref()).await;
                    let pruned = self.history.prune_expired(Utc::now()).await;

                    info!(
                        checked = summary.checked,
                        scheduled = summary.scheduled,
                        failed = summary.failed,
                        missing = summary.missing,
                        pruned,
                        "Budget sweep finished"
                    );
                }
            }
        }
    }
}
