//! Incremental change feeds for pull-based consumers.
//!
//! Offline clients (POS terminals, mobile apps) catch up by asking "what
//! changed since timestamp T" per module. Two feeds exist per document
//! type:
//!
//! - **created-or-updated**: full records whose creation or update time
//!   is strictly greater than `since`, excluding soft-deleted records,
//!   ordered by last-activity time ascending.
//! - **deleted**: identity-only [`DeleteMarker`]s for records
//!   soft-deleted strictly after `since`, ordered by deletion time
//!   ascending. Consumers tombstone locally without ever seeing the
//!   deleted payload.
//!
//! Each feed comes in two request modes: page mode (1-based page/limit
//! with a [`PageMeta`] envelope) and step mode (offset/limit with a flat
//! total, for export jobs that walk the entire result).
//!
//! # Cursor discipline
//!
//! The comparison is strictly greater, so a record whose timestamp
//! exactly equals `since` is not returned. A client that advances its
//! cursor to the largest timestamp it received will therefore never see
//! that record again, but also never sees duplicates. Clients that
//! cannot tolerate the miss should advance to `max_seen - 1ms` and
//! deduplicate by guid.

use crate::config::CoreConfig;
use crate::deadline::with_timeout;
use crate::error::Result;
use crate::pagination::{PageMeta, Pageable, PageableStep, Window};
use crate::record::{DeleteMarker, VersionedRecord};
use crate::store::{DurableStore, RecordFilter, RecordQuery, SortField, SortSpec};
use chrono::{DateTime, Utc};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tracing::{instrument, warn};

/// One page of the created-or-updated feed.
#[derive(Debug, Clone)]
pub struct FeedPage<R> {
    pub records: Vec<R>,
    pub meta: PageMeta,
}

/// One page of the deleted feed.
#[derive(Debug, Clone)]
pub struct DeletedPage {
    pub markers: Vec<DeleteMarker>,
    pub meta: PageMeta,
}

/// Change-feed queries over one document type.
pub struct ChangeFeedTracker<R, S>
where
    R: VersionedRecord,
    S: DurableStore<R>,
{
    store: Arc<S>,
    config: CoreConfig,
    _record: PhantomData<fn() -> R>,
}

impl<R, S> ChangeFeedTracker<R, S>
where
    R: VersionedRecord,
    S: DurableStore<R>,
{
    pub fn new(store: Arc<S>, config: CoreConfig) -> Self {
        Self {
            store,
            config,
            _record: PhantomData,
        }
    }

    /// Page mode: records created or updated strictly after `since`.
    #[instrument(skip(self, extra), fields(tenant = %tenant, module = R::collection_name()))]
    pub async fn created_or_updated_page(
        &self,
        tenant: &str,
        since: DateTime<Utc>,
        pageable: Pageable,
        extra: Option<serde_json::Value>,
    ) -> Result<FeedPage<R>> {
        let pageable = self.clamp(pageable);
        let page = self
            .query(
                tenant,
                RecordFilter::CreatedOrUpdatedSince(since),
                SortSpec::asc(SortField::LastActivity),
                pageable.window(),
                extra,
                "created_or_updated",
            )
            .await?;

        Ok(FeedPage {
            meta: PageMeta::build(pageable, page.total),
            records: page.records,
        })
    }

    /// Step mode: as [`created_or_updated_page`](Self::created_or_updated_page)
    /// but addressed by raw offset, returning the flat total alongside.
    pub async fn created_or_updated_step(
        &self,
        tenant: &str,
        since: DateTime<Utc>,
        step: PageableStep,
        extra: Option<serde_json::Value>,
    ) -> Result<(Vec<R>, u64)> {
        let step = self.clamp_step(step);
        let page = self
            .query(
                tenant,
                RecordFilter::CreatedOrUpdatedSince(since),
                SortSpec::asc(SortField::LastActivity),
                step.window(),
                extra,
                "created_or_updated",
            )
            .await?;
        Ok((page.records, page.total))
    }

    /// Page mode: identity markers for records deleted strictly after
    /// `since`.
    #[instrument(skip(self, extra), fields(tenant = %tenant, module = R::collection_name()))]
    pub async fn deleted_page(
        &self,
        tenant: &str,
        since: DateTime<Utc>,
        pageable: Pageable,
        extra: Option<serde_json::Value>,
    ) -> Result<DeletedPage> {
        let pageable = self.clamp(pageable);
        let page = self
            .query(
                tenant,
                RecordFilter::DeletedSince(since),
                SortSpec::asc(SortField::DeletedAt),
                pageable.window(),
                extra,
                "deleted",
            )
            .await?;

        Ok(DeletedPage {
            meta: PageMeta::build(pageable, page.total),
            markers: to_markers(page.records),
        })
    }

    /// Step mode of the deleted feed.
    pub async fn deleted_step(
        &self,
        tenant: &str,
        since: DateTime<Utc>,
        step: PageableStep,
        extra: Option<serde_json::Value>,
    ) -> Result<(Vec<DeleteMarker>, u64)> {
        let step = self.clamp_step(step);
        let page = self
            .query(
                tenant,
                RecordFilter::DeletedSince(since),
                SortSpec::asc(SortField::DeletedAt),
                step.window(),
                extra,
                "deleted",
            )
            .await?;
        Ok((to_markers(page.records), page.total))
    }

    async fn query(
        &self,
        tenant: &str,
        filter: RecordFilter,
        sort: SortSpec,
        window: Window,
        extra: Option<serde_json::Value>,
        kind: &'static str,
    ) -> Result<crate::store::QueryPage<R>> {
        let started = Instant::now();
        let query = RecordQuery::new(tenant, filter).with_extra(extra);
        let page = with_timeout("feed_query", self.config.op_timeout(), async {
            self.store.find_page(query, sort, window).await.map_err(Into::into)
        })
        .await?;

        crate::metrics::record_feed_page(
            R::collection_name(),
            kind,
            page.records.len(),
            started.elapsed(),
        );
        Ok(page)
    }

    fn clamp(&self, pageable: Pageable) -> Pageable {
        Pageable {
            page: pageable.page.max(1),
            limit: self.config.page.clamp_limit(pageable.limit),
        }
    }

    fn clamp_step(&self, step: PageableStep) -> PageableStep {
        PageableStep {
            offset: step.offset,
            limit: self.config.page.clamp_limit(step.limit),
        }
    }
}

/// Project deleted records to markers. A record the store returned from
/// the deleted filter without a deletion stamp is a store bug; it is
/// logged and skipped rather than surfaced with a fabricated timestamp.
fn to_markers<R: VersionedRecord>(records: Vec<R>) -> Vec<DeleteMarker> {
    records
        .iter()
        .filter_map(|r| {
            let marker = DeleteMarker::from_record(r);
            if marker.is_none() {
                warn!(guid = %r.guid(), "deleted feed returned a live record; skipping");
            }
            marker
        })
        .collect()
}
