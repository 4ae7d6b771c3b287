//! At-most-one-in-flight evaluation per budget

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

/// Registry of budget ids currently being evaluated
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlightRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `budget_id`. Returns `None` when another evaluation holds it.
    pub fn try_enter(&self, budget_id: &str) -> Option<InFlightGuard> {
        let inserted = self.ids.lock().insert(budget_id.to_string());
        inserted.then(|| InFlightGuard {
            registry: self.clone(),
            budget_id: budget_id.to_string(),
        })
    }

    /// Release `budget_id`; releasing an id that is not held is a no-op
    pub fn leave(&self, budget_id: &str) {
        self.ids.lock().remove(budget_id);
    }

    /// Whether `budget_id` is currently held
    pub fn is_in_flight(&self, budget_id: &str) -> bool {
        self.ids.lock().contains(budget_id)
    }

    /// Number of evaluations in flight
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// Whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}

/// Releases its budget id when dropped
#[derive(Debug)]
#[must_use = "the budget is released as soon as the guard is dropped"]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    budget_id: String,
}

impl InFlightGuard {
    /// The budget id this guard holds
    pub fn budget_id(&self) -> &str {
        &self.budget_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.leave(&self.budget_id);
    }
}
