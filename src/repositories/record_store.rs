use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Read-modify-write callback used by [`RecordStore::update`].
pub type UpdateFn = Box<dyn FnOnce(Option<String>) -> Result<String, ServiceError> + Send>;

/// One raw entry as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: String,
    pub raw: String,
}

/// Minimal key-value contract the aggregation core depends on.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;

    async fn set(&self, key: &str, value: String) -> Result<(), ServiceError>;

    async fn remove(&self, key: &str) -> Result<(), ServiceError>;

    /// Keys starting with `prefix`, sorted.
    async fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, ServiceError>;

    /// Atomically replaces the value under `key` with `f(current)`.
    /// When `f` fails nothing is written.
    async fn update(&self, key: &str, f: UpdateFn) -> Result<String, ServiceError>;

    /// Every entry under `prefix`, sorted by key.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<StoredRecord>, ServiceError> {
        let mut records = Vec::new();
        for key in self.list_keys_with_prefix(prefix).await? {
            if let Some(raw) = self.get(&key).await? {
                records.push(StoredRecord { key, raw });
            }
        }
        Ok(records)
    }

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str;
}

/// Process-local store; also the fallback when the database is unreachable.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    entries: DashMap<String, String>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ServiceError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ServiceError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn update(&self, key: &str, f: UpdateFn) -> Result<String, ServiceError> {
        // The entry guard holds the shard lock for the whole read-modify-write.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = f(Some(occupied.get().clone()))?;
                occupied.insert(next.clone());
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                let next = f(None)?;
                vacant.insert(next.clone());
                Ok(next)
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
