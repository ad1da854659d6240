// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable-store port.
//!
//! The core never talks to a database driver directly; a concrete store
//! (document or relational) implements [`DurableStore`] and is injected
//! at construction time. This keeps the store substitutable with an
//! in-memory fake in tests and decouples the core from driver crates.
//!
//! The durable store is the single source of truth and the **only**
//! component permitted to enforce uniqueness: `create`/`create_batch`
//! must reject a natural-key collision within (tenant, not-deleted)
//! scope with [`StoreError::Conflict`]. The advisory cache is never the
//! final uniqueness check.
//!
//! Queries are typed rather than stringly-filtered: components build a
//! [`RecordQuery`] and the store maps it onto its own query language.

use crate::pagination::Window;
use crate::record::VersionedRecord;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Errors a concrete store may report.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Natural-key uniqueness constraint violated; carries the losing key.
    Conflict(String),
    /// Transport/driver failure.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict(key) => write!(f, "conflict on key {}", key),
            Self::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Row-selection predicate within a tenant.
///
/// `CreatedOrUpdatedSince` and `DeletedSince` use strictly-greater
/// comparison on `since`; the former matches only non-deleted records,
/// the latter only soft-deleted ones. All other variants implicitly
/// exclude soft-deleted records.
#[derive(Debug, Clone)]
pub enum RecordFilter {
    /// Every non-deleted record.
    All,
    /// Guid surrogate match.
    Guid(String),
    /// Exact natural-key match.
    NaturalKeyExact(String),
    /// Natural keys starting with a prefix (doc-no scans).
    NaturalKeyPrefix(String),
    /// Natural key within a set (bulk existence checks).
    NaturalKeyIn(Vec<String>),
    /// Change feed: `created_at > since OR updated_at > since`, non-deleted.
    CreatedOrUpdatedSince(DateTime<Utc>),
    /// Change feed: `deleted_at > since`, soft-deleted only.
    DeletedSince(DateTime<Utc>),
}

/// A complete, tenant-scoped query.
#[derive(Debug, Clone)]
pub struct RecordQuery {
    pub tenant: String,
    pub filter: RecordFilter,
    /// Opaque caller-supplied refinement, interpreted by the store
    /// (e.g. `{"branch": "02"}`). `None` means no refinement.
    pub extra: Option<serde_json::Value>,
}

impl RecordQuery {
    pub fn new(tenant: &str, filter: RecordFilter) -> Self {
        Self {
            tenant: tenant.to_string(),
            filter,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: Option<serde_json::Value>) -> Self {
        self.extra = extra;
        self
    }
}

/// Field a query sorts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    NaturalKey,
    /// `updated_at` if present, else `created_at`.
    LastActivity,
    DeletedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub dir: SortDir,
}

impl SortSpec {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            dir: SortDir::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            dir: SortDir::Desc,
        }
    }
}

/// One window of a query result plus the unwindowed total.
#[derive(Debug, Clone)]
pub struct QueryPage<R> {
    pub records: Vec<R>,
    pub total: u64,
}

/// Trait defining what the core needs from a durable store.
///
/// Implementations must apply the soft-delete semantics documented on
/// [`RecordFilter`] and enforce natural-key uniqueness on the create
/// paths. `soft_delete` stamps the deletion timestamp and actor; it never
/// removes the row.
pub trait DurableStore<R: VersionedRecord>: Send + Sync + 'static {
    /// First record matching the query under the given sort, if any.
    fn find_one(&self, query: RecordQuery, sort: SortSpec) -> BoxFuture<'_, Option<R>>;

    /// One window of matching records plus the total match count.
    fn find_page(
        &self,
        query: RecordQuery,
        sort: SortSpec,
        window: Window,
    ) -> BoxFuture<'_, QueryPage<R>>;

    /// Persist a new record. Conflicts with an existing non-deleted
    /// natural key fail with [`StoreError::Conflict`].
    fn create(&self, doc: R) -> BoxFuture<'_, ()>;

    /// Persist a batch in one call. All-or-nothing: on failure no record
    /// of the batch is persisted.
    fn create_batch(&self, docs: Vec<R>) -> BoxFuture<'_, ()>;

    /// Replace the record with the given guid.
    fn update(&self, tenant: &str, guid: &str, doc: R) -> BoxFuture<'_, ()>;

    /// Stamp the record deleted. Returns `false` if no live record had
    /// the guid.
    fn soft_delete(&self, tenant: &str, guid: &str, actor: &str) -> BoxFuture<'_, bool>;
}
