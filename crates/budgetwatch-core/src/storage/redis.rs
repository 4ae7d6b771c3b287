//! Redis-backed key-value store

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;

use crate::error::{Error, Result};

use super::KeyValueStore;

/// Key-value store on a pooled Redis connection
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    namespace: String,
}

impl RedisStore {
    /// Create a store for the given Redis URL
    pub fn new(url: &str) -> Result<Self> {
        let pool = PoolConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::storage(e.to_string()))?;

        Ok(Self {
            pool,
            namespace: "budgetwatch".to_string(),
        })
    }

    /// Prefix every key with `namespace:`
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| Error::storage(e.to_string()))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::storage(e.to_string()))?;
        Ok(())
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await.map_err(|e| Error::storage(e.to_string()))?;
        let value: Option<Vec<u8>> = conn
            .get(self.namespaced(key))
            .await
            .map_err(|e| Error::storage(e.to_string()))?;
        Ok(value)
    }

    async fn set_blob(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| Error::storage(e.to_string()))?;
        let _: () = conn
            .set(self.namespaced(key), value)
            .await
            .map_err(|e| Error::storage(e.to_string()))?;
        Ok(())
    }
}
