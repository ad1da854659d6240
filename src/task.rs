//! Detached side-effect tasks.
//!
//! Three side effects run off the request path: the opportunistic
//! sequence-counter cache write, dirty-flag marking, and event
//! publication. [`DetachedTasks`] makes their contract explicit rather
//! than an implicit background-thread convention:
//!
//! - the spawned job never blocks the caller;
//! - it runs with its own lifetime, so cancelling the triggering request
//!   does not abort it (a response may be observed before the side
//!   effect lands, but the side effect is never silently dropped by
//!   cancellation);
//! - an `Err` outcome is logged at warn and swallowed, never propagated.
//!
//! `spawn` returns the `JoinHandle` so tests can await completion;
//! production callers drop it.

use std::fmt::Display;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::warn;

/// Spawner for fire-and-forget side-effect jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedTasks;

impl DetachedTasks {
    pub fn new() -> Self {
        Self
    }

    /// Spawn a detached job. The label names the side effect in logs.
    pub fn spawn<F, E>(&self, label: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Display,
    {
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                warn!(task = label, error = %e, "detached task failed");
                crate::metrics::record_detached_task(label, false);
            } else {
                crate::metrics::record_detached_task(label, true);
            }
        })
    }
}
