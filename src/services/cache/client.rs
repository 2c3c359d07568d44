//! Cache client interface used by higher-level services (one-time login tokens).
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command).
///
/// Kept independent from `AppError` so callers decide how to fail.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
}

/// A minimal string cache.
///
/// One-time tokens need: set with TTL, atomic replace-and-return-previous,
/// atomic read-and-delete, delete.
/// Implementations must be cheap to clone (typically `Arc<...>` inside).
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Set (overwrite) a value with TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    // Atomically overwrite a value with TTL and return the value it replaced.
    async fn swap_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<Option<String>>;

    // Atomically get and delete. A second caller for the same key sees `None`.
    async fn take_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Delete a key. Returns number of deleted keys.
    async fn del(&self, key: &str) -> CacheResult<u64>;
}
