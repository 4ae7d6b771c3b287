//! Notification history used to deduplicate alerts
//!
//! The in-memory map is mirrored to a [`KeyValueStore`] after every change.
//! Persistence is best effort: a failed save is logged and the in-memory
//! state is kept.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::HistoryConfig;
use crate::error::Result;
use crate::models::AlertKind;
use crate::storage::KeyValueStore;

type HistoryKey = (String, AlertKind);

/// One persisted history record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Budget the alert was sent for
    pub budget_id: String,
    /// Alert kind
    pub kind: AlertKind,
    /// When the alert was last scheduled
    pub sent_at: DateTime<Utc>,
}

/// Deduplication history of scheduled notifications
pub struct NotificationHistory {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    max_age: Duration,
    soft_cap: usize,
    entries: Mutex<HashMap<HistoryKey, DateTime<Utc>>>,
}

fn composite_key(budget_id: &str, kind: AlertKind) -> String {
    format!("{budget_id}|{}", kind.storage_key())
}

fn parse_composite_key(key: &str) -> Option<HistoryKey> {
    let (budget_id, kind) = key.rsplit_once('|')?;
    if budget_id.is_empty() {
        return None;
    }
    Some((budget_id.to_string(), AlertKind::from_storage_key(kind)?))
}

fn is_older_than(sent_at: DateTime<Utc>, now: DateTime<Utc>, age: Duration) -> bool {
    (now - sent_at).to_std().is_ok_and(|elapsed| elapsed > age)
}

impl NotificationHistory {
    /// Create an empty history backed by `store`
    pub fn new(store: Arc<dyn KeyValueStore>, config: &HistoryConfig) -> Self {
        Self {
            store,
            storage_key: config.storage_key.clone(),
            max_age: config.max_age,
            soft_cap: config.soft_cap,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create a history and load any persisted entries, pruning stale ones
    pub async fn load(store: Arc<dyn KeyValueStore>, config: &HistoryConfig, now: DateTime<Utc>) -> Self {
        let history = Self::new(store, config);
        let loaded = history.reload().await;
        let pruned = history.prune(now, history.max_age).await;
        debug!(loaded, pruned, "Loaded notification history");
        history
    }

    /// Replace the in-memory map with the persisted one.
    ///
    /// Unreadable or malformed data yields an empty history; malformed keys
    /// are skipped individually.
    pub async fn reload(&self) -> usize {
        let blob = match self.store.get_blob(&self.storage_key).await {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, key = %self.storage_key, "Failed to read notification history");
                None
            }
        };

        let raw: HashMap<String, DateTime<Utc>> = match blob {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding unreadable notification history");
                HashMap::new()
            }),
            None => HashMap::new(),
        };

        let mut parsed = HashMap::with_capacity(raw.len());
        for (key, sent_at) in raw {
            match parse_composite_key(&key) {
                Some(history_key) => {
                    parsed.insert(history_key, sent_at);
                }
                None => warn!(key = %key, "Skipping malformed history key"),
            }
        }

        let count = parsed.len();
        *self.entries.lock().await = parsed;
        count
    }

    /// Whether an alert of `kind` was scheduled for `budget_id` within `window` of `now`
    pub async fn has_recent_entry(
        &self,
        budget_id: &str,
        kind: AlertKind,
        now: DateTime<Utc>,
        window: Duration,
    ) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(&(budget_id.to_string(), kind))
            // A timestamp in the future counts as zero elapsed time
            .is_some_and(|sent_at| (now - *sent_at).to_std().unwrap_or_default() < window)
    }

    /// When an alert of `kind` was last scheduled for `budget_id`
    pub async fn last_sent(&self, budget_id: &str, kind: AlertKind) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .await
            .get(&(budget_id.to_string(), kind))
            .copied()
    }

    /// Record a successful schedule and persist
    pub async fn record(&self, budget_id: &str, kind: AlertKind, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().await;
        entries.insert((budget_id.to_string(), kind), now);

        if entries.len() > self.soft_cap {
            let before = entries.len();
            entries.retain(|_, sent_at| !is_older_than(*sent_at, now, self.max_age));
            debug!(pruned = before - entries.len(), "Pruned notification history over soft cap");
        }

        self.persist(&entries).await;
    }

    /// Forget an entry and persist; returns whether one existed
    pub async fn remove(&self, budget_id: &str, kind: AlertKind) -> bool {
        let mut entries = self.entries.lock().await;
        let existed = entries.remove(&(budget_id.to_string(), kind)).is_some();
        self.persist(&entries).await;
        existed
    }

    /// Forget every entry of `budget_id` whose kind matches; persists when any was removed
    pub async fn remove_where<F>(&self, budget_id: &str, matches: F) -> usize
    where
        F: Fn(AlertKind) -> bool,
    {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|(id, kind), _| id != budget_id || !matches(*kind));
        let removed = before - entries.len();

        if removed > 0 {
            self.persist(&entries).await;
        }
        removed
    }

    /// Drop entries older than `max_age`; returns how many were removed
    pub async fn prune(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, sent_at| !is_older_than(*sent_at, now, max_age));
        let removed = before - entries.len();

        if removed > 0 {
            self.persist(&entries).await;
        }
        removed
    }

    /// Drop entries older than the configured max age
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        self.prune(now, self.max_age).await
    }

    /// Snapshot of every entry, most recent first
    pub async fn entries(&self) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().await;
        let mut list: Vec<HistoryEntry> = entries
            .iter()
            .map(|((budget_id, kind), sent_at)| HistoryEntry {
                budget_id: budget_id.clone(),
                kind: *kind,
                sent_at: *sent_at,
            })
            .collect();
        list.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then_with(|| a.budget_id.cmp(&b.budget_id)));
        list
    }

    /// Number of entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the history is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Persist the current map
    pub async fn save(&self) -> Result<()> {
        let entries = self.entries.lock().await;
        self.write(&entries).await
    }

    async fn persist(&self, entries: &HashMap<HistoryKey, DateTime<Utc>>) {
        if let Err(e) = self.write(entries).await {
            warn!(error = %e, key = %self.storage_key, "Failed to persist notification history");
        }
    }

    async fn write(&self, entries: &HashMap<HistoryKey, DateTime<Utc>>) -> Result<()> {
        let raw: HashMap<String, DateTime<Utc>> = entries
            .iter()
            .map(|((budget_id, kind), sent_at)| (composite_key(budget_id, *kind), *sent_at))
            .collect();
        let bytes = serde_json::to_vec(&raw)?;
        self.store.set_blob(&self.storage_key, &bytes).await
    }
}
