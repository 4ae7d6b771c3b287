//! Read-only budget sources

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::models::Budget;

/// Supplies the latest snapshot of a budget by id
#[async_trait]
pub trait BudgetSource: Send + Sync {
    /// Fetch a budget; `Ok(None)` when it no longer exists
    async fn fetch_budget(&self, budget_id: &str) -> Result<Option<Budget>>;
}

/// Budgets held in memory, updatable by the owner
#[derive(Debug, Clone, Default)]
pub struct MemoryBudgetSource {
    budgets: Arc<RwLock<HashMap<String, Budget>>>,
}

impl MemoryBudgetSource {
    /// Create a source from a list of budgets
    pub fn new(budgets: impl IntoIterator<Item = Budget>) -> Self {
        let source = Self::default();
        for budget in budgets {
            source.upsert(budget);
        }
        source
    }

    /// Insert or replace a budget snapshot
    pub fn upsert(&self, budget: Budget) {
        self.budgets.write().insert(budget.id.clone(), budget);
    }

    /// Remove a budget
    pub fn remove(&self, budget_id: &str) -> Option<Budget> {
        self.budgets.write().remove(budget_id)
    }
}

#[async_trait]
impl BudgetSource for MemoryBudgetSource {
    async fn fetch_budget(&self, budget_id: &str) -> Result<Option<Budget>> {
        Ok(self.budgets.read().get(budget_id).cloned())
    }
}

/// Budgets read from a JSON array file on every fetch
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    /// Create a source for `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File the budgets are read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every budget in the file
    pub async fn load_all(&self) -> Result<Vec<Budget>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found("budget file", self.path.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl BudgetSource for JsonFileSource {
    async fn fetch_budget(&self, budget_id: &str) -> Result<Option<Budget>> {
        let budgets = self.load_all().await?;
        Ok(budgets.into_iter().find(|b| b.id == budget_id))
    }
}
