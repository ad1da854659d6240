// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-tenant sequential document numbers.
//!
//! A document number is `<PREFIX><5-digit zero-padded counter>`, where
//! the prefix is typically a module code plus a `YYYYMMDD` date (e.g.
//! `SI20240601` → `SI2024060100008`). Counters are per (tenant, prefix),
//! so each tenant restarts at 1 every day without any reset job.
//!
//! # Number sourcing
//!
//! The generator consults two sources in order:
//!
//! 1. **Cache fast path**: the last committed counter under
//!    [`counter_key`]. A miss, a zero, or a cache failure all fall
//!    through; the cache can never make numbering wrong, only cheap.
//! 2. **Store fallback**: the highest existing document number with the
//!    prefix, found by a descending natural-key scan. The numeric suffix
//!    is parsed out; an unparseable suffix counts as 0, so a corrupt
//!    stray document restarts the sequence rather than wedging it.
//!
//! The candidate is last + 1 either way. Before handing it out, a
//! uniqueness backstop checks the exact formatted number against the
//! store and fails with `Conflict` if it already exists.
//!
//! # Concurrency caveat
//!
//! Minting is read-then-decide without any cross-process lock: two
//! concurrent callers can both read last = N and both produce N + 1. The
//! backstop narrows the window but cannot close it. The durable store's
//! uniqueness constraint is the real arbiter — exactly one of the racing
//! persists succeeds, and the loser gets `Conflict` and must redo the
//! whole operation. Callers needing stronger guarantees serialize
//! externally.

use crate::cache::{counter_key, CacheStore};
use crate::config::CoreConfig;
use crate::deadline::with_timeout;
use crate::error::{MasterSyncError, Result};
use crate::record::VersionedRecord;
use crate::store::{DurableStore, RecordFilter, RecordQuery, SortField, SortSpec};
use crate::task::DetachedTasks;
use chrono::{DateTime, Utc};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Zero-padding width of the numeric suffix.
const SUFFIX_WIDTH: usize = 5;

/// A minted document number and its raw counter value.
///
/// The counter is carried alongside the formatted string so it can be
/// committed to the cache after the record persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocNo {
    pub doc_no: String,
    pub number: i64,
}

/// Build the conventional prefix for a module and business date, e.g.
/// `doc_no_prefix("SI", date)` → `"SI20240601"`.
pub fn doc_no_prefix(module_code: &str, date: DateTime<Utc>) -> String {
    format!("{}{}", module_code, date.format("%Y%m%d"))
}

/// Sequence generator over a durable store and an advisory cache.
pub struct SequenceGenerator<R, S, C>
where
    R: VersionedRecord,
    S: DurableStore<R>,
    C: CacheStore,
{
    store: Arc<S>,
    cache: Arc<C>,
    config: CoreConfig,
    tasks: DetachedTasks,
    _record: PhantomData<fn() -> R>,
}

impl<R, S, C> SequenceGenerator<R, S, C>
where
    R: VersionedRecord,
    S: DurableStore<R>,
    C: CacheStore,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, config: CoreConfig) -> Self {
        Self {
            store,
            cache,
            config,
            tasks: DetachedTasks::new(),
            _record: PhantomData,
        }
    }

    /// Mint the next document number for (tenant, prefix).
    ///
    /// Does not reserve anything: the number only becomes taken when the
    /// caller persists a record carrying it, and only becomes visible to
    /// the fast path once [`commit`](Self::commit) lands.
    #[instrument(skip(self), fields(tenant = %tenant, prefix = %prefix))]
    pub async fn next_doc_no(&self, tenant: &str, prefix: &str) -> Result<DocNo> {
        if prefix.is_empty() {
            return Err(MasterSyncError::InvalidArgument(
                "document number prefix is empty".to_string(),
            ));
        }

        let (last, from_cache) = match self.cached_counter(tenant, prefix).await {
            Some(n) => {
                crate::metrics::record_counter_cache_lookup(true);
                (n, true)
            }
            None => {
                crate::metrics::record_counter_cache_lookup(false);
                (self.last_from_store(tenant, prefix).await?, false)
            }
        };

        let number = last + 1;
        let doc_no = format!("{}{:0width$}", prefix, number, width = SUFFIX_WIDTH);

        // Backstop: the cache (or a stale read) may have pointed at a
        // number already persisted by someone else.
        let query = RecordQuery::new(tenant, RecordFilter::NaturalKeyExact(doc_no.clone()));
        let existing = with_timeout("check_doc_no_exists", self.config.op_timeout(), async {
            self.store
                .find_one(query, SortSpec::desc(SortField::NaturalKey))
                .await
                .map_err(Into::into)
        })
        .await?;

        if existing.is_some() {
            warn!(doc_no = %doc_no, "document number already taken");
            crate::metrics::record_doc_no_conflict(prefix);
            return Err(MasterSyncError::Conflict { key: doc_no });
        }

        crate::metrics::record_doc_no_issued(prefix, from_cache);
        Ok(DocNo { doc_no, number })
    }

    /// Commit a counter to the cache after the carrying record persisted.
    ///
    /// Fire-and-forget: runs detached with the configured TTL, and a
    /// cache failure is logged and dropped. Returns the join handle so
    /// tests can await the write.
    pub fn commit(&self, tenant: &str, prefix: &str, number: i64) -> JoinHandle<()> {
        let key = counter_key(tenant, prefix);
        let ttl = self.config.doc_no_cache_ttl();
        let cache = Arc::clone(&self.cache);
        self.tasks.spawn("commit_doc_no_counter", async move {
            cache.set(&key, number, Some(ttl)).await
        })
    }

    /// Cache fast path. Misses, zero values, and cache errors all
    /// return `None` and defer to the store.
    async fn cached_counter(&self, tenant: &str, prefix: &str) -> Option<i64> {
        let key = counter_key(tenant, prefix);
        match self.cache.get(&key).await {
            Ok(Some(n)) if n > 0 => Some(n),
            Ok(_) => None,
            Err(e) => {
                debug!(key = %key, error = %e, "counter cache read failed; falling back to store");
                None
            }
        }
    }

    /// Store fallback: highest existing number under the prefix, or 0
    /// when none exists yet today.
    async fn last_from_store(&self, tenant: &str, prefix: &str) -> Result<i64> {
        let query = RecordQuery::new(tenant, RecordFilter::NaturalKeyPrefix(prefix.to_string()));
        let found = with_timeout("find_last_doc_no", self.config.op_timeout(), async {
            self.store
                .find_one(query, SortSpec::desc(SortField::NaturalKey))
                .await
                .map_err(Into::into)
        })
        .await?;

        Ok(found
            .map(|r| parse_counter(r.natural_key(), prefix))
            .unwrap_or(0))
    }
}

/// Extract the numeric suffix of a document number under a prefix.
/// Anything unparseable counts as 0 so the sequence restarts instead of
/// erroring on a stray document.
fn parse_counter(doc_no: &str, prefix: &str) -> i64 {
    doc_no
        .strip_prefix(prefix)
        .and_then(|suffix| suffix.parse::<i64>().ok())
        .unwrap_or(0)
}
