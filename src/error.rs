// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the synchronization core.
//!
//! Errors are categorized by what the caller can do about them. Hard
//! failures from the primary path (sequence generation, bulk reconcile)
//! propagate synchronously; side-effect failures (cache commits, dirty
//! marks, event publication) are logged and dropped by the components
//! that own them and never reach this type.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |---------------------|-----------|-------------|
//! | `Timeout` | Yes | Per-call deadline exceeded |
//! | `StoreUnavailable` | Yes | Durable store transport/driver failure |
//! | `Conflict` | Yes | Natural-key / document-number collision; redo the whole operation |
//! | `NotFound` | No | Lookup miss for a required record |
//! | `PartialBulkFailure`| No | Subset of bulk update items failed |
//! | `InvalidArgument` | No | Caller error (e.g. empty doc-no prefix) |
//! | `Config` | No | Configuration invalid |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! Use [`MasterSyncError::is_retryable()`] to decide whether to retry with
//! backoff. `Conflict` is retryable in the "redo from the top" sense: the
//! generated document number lost the race at persist time, and the caller
//! must rerun the entire create operation, not just the increment.

use crate::cache::CacheError;
use crate::events::PublishError;
use crate::store::StoreError;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, MasterSyncError>;

/// Errors that can occur in the synchronization core.
#[derive(Error, Debug)]
pub enum MasterSyncError {
    /// A required record was not found.
    ///
    /// Returned by lookups where absence is an error (e.g. updating a
    /// record that was deleted out from under the caller).
    #[error("not found: {entity} {key}")]
    NotFound { entity: &'static str, key: String },

    /// Natural-key or document-number collision.
    ///
    /// The uniqueness backstop found an existing record with the same key.
    /// The caller must retry the whole operation so a fresh number is
    /// generated against current state.
    #[error("conflict: {key} already exists")]
    Conflict { key: String },

    /// Per-call deadline exceeded.
    ///
    /// Every durable-store and cache call on the primary path is bounded
    /// by the configured operation timeout.
    #[error("timeout after {limit_ms}ms ({operation})")]
    Timeout { operation: String, limit_ms: u64 },

    /// Durable store transport or driver failure.
    ///
    /// The concrete store implementation reported an error unrelated to
    /// the query semantics. Typically transient.
    #[error("store unavailable ({operation}): {message}")]
    StoreUnavailable { operation: String, message: String },

    /// A subset of bulk update items failed.
    ///
    /// The reconciler itself always returns the full summary; this variant
    /// exists for callers that choose to escalate a non-empty
    /// `update_failed` list into a hard error.
    #[error("partial bulk failure: {} update(s) failed", failed.len())]
    PartialBulkFailure { failed: Vec<String> },

    /// Caller error: the request can never succeed as given.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected internal error. Indicates a bug, not a transient fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MasterSyncError {
    /// Create a store error with operation context.
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Check if this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::StoreUnavailable { .. } => true,
            Self::Conflict { .. } => true, // Redo the whole operation
            Self::NotFound { .. } => false,
            Self::PartialBulkFailure { .. } => false,
            Self::InvalidArgument(_) => false,
            Self::Config(_) => false,
            Self::Internal(_) => false,
        }
    }
}

impl From<StoreError> for MasterSyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(key) => Self::Conflict { key },
            StoreError::Unavailable(message) => {
                crate::metrics::record_store_error("store");
                Self::StoreUnavailable {
                    operation: "store".to_string(),
                    message,
                }
            }
        }
    }
}

impl From<CacheError> for MasterSyncError {
    fn from(e: CacheError) -> Self {
        // Cache failures only surface when a caller explicitly awaits one;
        // the advisory paths swallow them before reaching here.
        Self::Internal(format!("cache error: {}", e))
    }
}

impl From<PublishError> for MasterSyncError {
    fn from(e: PublishError) -> Self {
        Self::Internal(format!("publish error: {}", e))
    }
}
