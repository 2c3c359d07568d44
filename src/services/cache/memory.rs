//! In-process cache for development and tests.
//!
//! Single process only: tokens issued here are not visible to other replicas.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, (String, Instant)>) -> T,
    ) -> CacheResult<T> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| CacheError::BackendCommand("memory cache lock poisoned".into()))?;

        let now = Instant::now();
        guard.retain(|_, (_, expires_at)| *expires_at > now);

        Ok(f(&mut guard))
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        self.with_entries(|m| m.get(key).map(|(v, _)| v.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let expires_at = Instant::now() + ttl;
        self.with_entries(|m| {
            m.insert(key.to_string(), (value.to_string(), expires_at));
        })
    }

    async fn swap_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<Option<String>> {
        let expires_at = Instant::now() + ttl;
        self.with_entries(|m| {
            m.insert(key.to_string(), (value.to_string(), expires_at))
                .map(|(previous, _)| previous)
        })
    }

    async fn take_string(&self, key: &str) -> CacheResult<Option<String>> {
        self.with_entries(|m| m.remove(key).map(|(v, _)| v))
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        self.with_entries(|m| u64::from(m.remove(key).is_some()))
    }
}
