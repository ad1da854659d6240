//! Per-call deadlines for primary-path I/O.
//!
//! Every durable-store query, cache read on the hot path, and batched
//! insert is bounded by the configured operation timeout (15s default).
//! Exceeding it fails the whole operation with
//! [`MasterSyncError::Timeout`]. Detached side-effect tasks are outside
//! this scope and carry no deadline.

use crate::error::{MasterSyncError, Result};
use std::future::Future;
use std::time::Duration;

/// Run `fut` under a deadline, mapping elapse to a `Timeout` error.
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            crate::metrics::record_op_timeout(operation);
            Err(MasterSyncError::Timeout {
                operation: operation.to_string(),
                limit_ms: limit.as_millis() as u64,
            })
        }
    }
}
