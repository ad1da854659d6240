//! Event publisher port.
//!
//! After a mutation persists, the core notifies downstream consumers
//! (search indexers, reporting, other services) through this port.
//! Publication is at-most-once and best-effort: it happens on a detached
//! task after the durable write succeeds, failures are logged and never
//! retried, and the triggering caller never observes them.

use std::future::Future;
use std::pin::Pin;

/// Result type for publish operations.
pub type PublishResult<T> = std::result::Result<T, PublishError>;

/// Type alias for boxed async futures.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = PublishResult<T>> + Send + 'a>>;

/// Simplified error for publisher operations.
#[derive(Debug, Clone)]
pub struct PublishError(pub String);

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PublishError {}

/// Mutation kinds announced on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    BulkImported,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::BulkImported => "bulk-imported",
        }
    }
}

/// Topic for a module/change pair, e.g. `product.created`.
pub fn topic(module: &str, kind: ChangeKind) -> String {
    format!("{}.{}", module, kind.as_str())
}

/// Trait defining what the core needs from the message broker.
pub trait EventPublisher: Send + Sync + 'static {
    /// Publish one event. The key is the record identity used for
    /// partitioning; the payload is an opaque serialized document.
    fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BoxFuture<'_, ()>;
}

/// Publisher that logs and drops every event.
#[derive(Clone, Default)]
pub struct NoOpPublisher;

impl EventPublisher for NoOpPublisher {
    fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BoxFuture<'_, ()> {
        let topic = topic.to_string();
        let key = key.to_string();
        Box::pin(async move {
            tracing::debug!(topic = %topic, key = %key, len = payload.len(), "noop publisher: dropping event");
            Ok(())
        })
    }
}
