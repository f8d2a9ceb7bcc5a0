//! In-memory object store with failure injection.

use super::{window_listing, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
    failures: RwLock<Failures>,
}

#[derive(Default)]
struct Failures {
    /// Puts whose key contains one of these fragments fail
    put: Vec<String>,
    /// Listings under these exact prefixes fail
    list: HashSet<String>,
    /// Deletes of these exact keys fail
    delete: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object without going through the async interface
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), data.into());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn fail_puts_containing(&self, fragment: impl Into<String>) {
        self.failures_mut().put.push(fragment.into());
    }

    pub fn fail_list(&self, prefix: impl Into<String>) {
        self.failures_mut().list.insert(prefix.into());
    }

    pub fn fail_delete(&self, key: impl Into<String>) {
        self.failures_mut().delete.insert(key.into());
    }

    fn failures_mut(&self) -> std::sync::RwLockWriteGuard<'_, Failures> {
        self.failures.write().unwrap_or_else(|e| e.into_inner())
    }

    fn failures(&self) -> std::sync::RwLockReadGuard<'_, Failures> {
        self.failures.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()> {
        if self.failures().put.iter().any(|f| key.contains(f.as_str())) {
            return Err(StoreError::Unavailable(format!("put rejected for {}", key)));
        }
        self.insert(key, data);
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        offset: usize,
        limit: usize,
        recursive: bool,
    ) -> StoreResult<Vec<String>> {
        if self.failures().list.contains(prefix) {
            return Err(StoreError::Unavailable(format!("list rejected for {}", prefix)));
        }
        Ok(window_listing(self.keys(), prefix, offset, limit, recursive))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if self.failures().delete.contains(key) {
            return Err(StoreError::Unavailable(format!("delete rejected for {}", key)));
        }
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}
