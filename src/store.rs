//! In-memory key-value storage engine with thread-safe access
//!
//! The store is the single shared mutable resource in the process: every
//! session calls into one instance concurrently. An RwLock around the map
//! serializes conflicting writes and guarantees readers only ever observe
//! fully written values. A lookup miss is routine data (`None`), never a
//! failure of the engine.

use crate::error::Result;
use crate::wal::WriteAheadLog;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait defining the interface for key-value storage operations
pub trait Store: Send + Sync {
    /// Set a key-value pair, overwriting any prior value
    async fn set(&self, key: String, value: String) -> Result<()>;

    /// Get the current value for a key, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Number of stored entries
    async fn len(&self) -> usize;
}

/// Thread-safe in-memory key-value store, optionally backed by a WAL
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, String>>>,
    wal: Option<Arc<WriteAheadLog>>,
}

impl MemoryStore {
    /// Create a purely in-memory store
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            wal: None,
        }
    }

    /// Create a store that logs every mutation to the given WAL
    pub fn with_wal(wal: Arc<WriteAheadLog>) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            wal: Some(wal),
        }
    }

    /// Replay the WAL into memory, returning the number of live entries.
    ///
    /// Mutations are applied directly, without re-logging.
    pub async fn restore_from_wal(&self) -> Result<usize> {
        let Some(wal) = &self.wal else {
            return Ok(0);
        };

        let entries = wal.replay()?;
        let mut data = self.data.write().await;
        for entry in entries {
            data.insert(entry.key, entry.value);
        }
        Ok(data.len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            wal: self.wal.clone(),
        }
    }
}

impl Store for MemoryStore {
    async fn set(&self, key: String, value: String) -> Result<()> {
        // Log to the WAL first so a crash never loses an acknowledged write
        if let Some(wal) = &self.wal {
            wal.append(&key, &value).await?;
        }

        let mut data = self.data.write().await;
        data.insert(key, value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn len(&self) -> usize {
        let data = self.data.read().await;
        data.len()
    }
}
