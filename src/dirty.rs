//! Dirty-flag markers.
//!
//! After any mutation, the owning (tenant, module) pair is marked dirty
//! in the advisory cache so polling consumers can cheaply ask "did
//! anything change here?" before paying for a full change-feed query.
//! The marker value is the mutation time in epoch milliseconds; a
//! consumer compares it against its own last-sync time.
//!
//! Marking is strictly fire-and-forget: it runs on a detached task, a
//! cache failure is logged and swallowed, and the triggering mutation
//! never waits on it or observes its outcome. A lost marker costs one
//! redundant feed query, nothing more.

use crate::cache::{dirty_key, CacheStore};
use crate::task::DetachedTasks;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fire-and-forget (tenant, module) dirty markers.
pub struct DirtyFlagCache<C: CacheStore> {
    cache: Arc<C>,
    tasks: DetachedTasks,
}

impl<C: CacheStore> DirtyFlagCache<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self {
            cache,
            tasks: DetachedTasks::new(),
        }
    }

    /// Mark (tenant, module) dirty as of now. Returns the join handle so
    /// tests can await the write; production callers drop it.
    pub fn mark_dirty(&self, tenant: &str, module: &str) -> JoinHandle<()> {
        let key = dirty_key(tenant, module);
        let stamp = Utc::now().timestamp_millis();
        let cache = Arc::clone(&self.cache);
        let module_owned = module.to_string();
        self.tasks.spawn("mark_dirty", async move {
            // No TTL: the marker stays until overwritten so late-polling
            // consumers still see it.
            let result = cache.set(&key, stamp, None).await;
            crate::metrics::record_dirty_mark(&module_owned, result.is_ok());
            result
        })
    }
}
