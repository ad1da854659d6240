//! Advisory cache port.
//!
//! Backs the sequence counter fast path and the dirty-flag markers. The
//! cache is strictly advisory: a stale, missing, or failing cache never
//! changes an answer, only its cost. It must never be consulted as the
//! final uniqueness check — that belongs to the durable store.
//!
//! Injected as a port (not a process-global) so tests can substitute an
//! in-memory fake, and so a deployment without a cache tier can run on
//! [`NoOpCache`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Type alias for boxed async futures.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = CacheResult<T>> + Send + 'a>>;

/// Simplified error for cache operations.
#[derive(Debug, Clone)]
pub struct CacheError(pub String);

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CacheError {}

/// Integer key-value cache with optional per-entry TTL.
pub trait CacheStore: Send + Sync + 'static {
    /// Look up a value. `Ok(None)` is a miss, not an error.
    fn get(&self, key: &str) -> BoxFuture<'_, Option<i64>>;

    /// Write a value. `ttl = None` means no expiry.
    fn set(&self, key: &str, value: i64, ttl: Option<Duration>) -> BoxFuture<'_, ()>;
}

/// Cache key for the last-issued sequence counter of (tenant, prefix).
pub fn counter_key(tenant: &str, prefix: &str) -> String {
    format!("docno:{}:{}", tenant, prefix)
}

/// Cache key for the dirty flag of (tenant, module).
pub fn dirty_key(tenant: &str, module: &str) -> String {
    format!("dirty:{}:{}", tenant, module)
}

/// Cache that misses on every read and discards every write.
///
/// Running on this is always correct, just slower: the sequence
/// generator falls back to the durable store on each call.
#[derive(Clone, Default)]
pub struct NoOpCache;

impl CacheStore for NoOpCache {
    fn get(&self, key: &str) -> BoxFuture<'_, Option<i64>> {
        let key = key.to_string();
        Box::pin(async move {
            tracing::trace!(key = %key, "noop cache: miss");
            Ok(None)
        })
    }

    fn set(&self, key: &str, value: i64, _ttl: Option<Duration>) -> BoxFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            tracing::trace!(key = %key, value, "noop cache: discarding write");
            Ok(())
        })
    }
}
