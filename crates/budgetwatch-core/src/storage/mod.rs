//! Persistent key-value storage
//!
//! The engine persists a single blob (the notification history) under a
//! well-known key. Any store that can get and set byte blobs will do.

mod file;
mod redis;

pub use file::FileStore;
pub use redis::RedisStore;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::{HistoryConfig, StorageBackend};
use crate::error::{Error, Result};

/// Byte-blob store keyed by string
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`
    async fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob stored under `key`
    async fn set_blob(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Volatile in-process store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    async fn set_blob(&self, key: &str, value: &[u8]) -> Result<()> {
        self.blobs.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Open the store selected by the history configuration
pub async fn open(config: &HistoryConfig) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => {
            let dir = match &config.path {
                Some(path) => path.clone(),
                None => crate::config::default_data_dir()
                    .ok_or_else(|| Error::config("no data directory available, set history.path"))?,
            };
            Arc::new(FileStore::open(dir).await?)
        }
        StorageBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| Error::config("history.redis_url is required for the redis backend"))?;
            let store = RedisStore::new(url)?;
            store.health_check().await?;
            Arc::new(store)
        }
    };

    Ok(store)
}
