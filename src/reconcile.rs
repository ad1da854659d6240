// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bulk reconciliation of imported record batches.
//!
//! Import jobs hand over a whole payload of records at once (a stock file,
//! a menu upload). The reconciler classifies and lands them in stages:
//!
//! 1. [`filter_duplicate`]: drop payload-internal natural-key duplicates,
//!    first occurrence wins.
//! 2. Existing-key lookup: one batched store query per chunk of keys, not
//!    one per record.
//! 3. [`prepare_payload_data`]: split survivors into `to_create` (key not
//!    in store) and `to_update` (key already present).
//! 4. Updates apply per record: fetch the live record, merge the incoming
//!    payload onto it, write it back. An individual failure is recorded
//!    in the summary and the loop continues.
//! 5. Creates land in one all-or-nothing `create_batch`. Its failure
//!    fails the whole call; nothing from the batch is persisted.
//!
//! Every input record ends up in exactly one [`BulkSummary`] bucket, so
//! the four bucket sizes always sum to the input size.

use crate::config::CoreConfig;
use crate::deadline::with_timeout;
use crate::error::Result;
use crate::pagination::Window;
use crate::record::{new_guid, VersionedRecord};
use crate::store::{DurableStore, RecordFilter, RecordQuery, SortField, SortSpec};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tracing::{instrument, warn};

/// Keys per existing-key store query.
const EXISTS_BATCH: usize = 500;

/// Outcome of one reconciliation, bucketed by natural key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkSummary {
    /// Keys persisted by the batch insert.
    pub created: Vec<String>,
    /// Keys merged onto an existing record.
    pub updated: Vec<String>,
    /// Keys whose individual update failed; the rest of the run was
    /// unaffected.
    pub update_failed: Vec<String>,
    /// Keys dropped because an earlier payload record had the same key.
    pub payload_duplicates: Vec<String>,
}

impl BulkSummary {
    /// Total records accounted for.
    pub fn total(&self) -> usize {
        self.created.len()
            + self.updated.len()
            + self.update_failed.len()
            + self.payload_duplicates.len()
    }

    /// Whether any individual update failed.
    pub fn has_failures(&self) -> bool {
        !self.update_failed.is_empty()
    }

    /// Escalate update failures into a hard error, for callers that treat
    /// a partially-applied import as fatal.
    pub fn to_error(&self) -> Option<crate::error::MasterSyncError> {
        if self.has_failures() {
            Some(crate::error::MasterSyncError::PartialBulkFailure {
                failed: self.update_failed.clone(),
            })
        } else {
            None
        }
    }
}

/// Drop payload-internal duplicates by natural key, first occurrence
/// wins. Returns the survivors in input order plus the dropped keys.
pub fn filter_duplicate<R: VersionedRecord>(records: Vec<R>) -> (Vec<R>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    let mut duplicates = Vec::new();

    for record in records {
        let key = record.natural_key().to_string();
        if seen.insert(key.clone()) {
            unique.push(record);
        } else {
            duplicates.push(key);
        }
    }
    (unique, duplicates)
}

/// Split records into (to_create, to_update) against the set of natural
/// keys already present in the store. Input order is preserved within
/// each bucket.
pub fn prepare_payload_data<R: VersionedRecord>(
    records: Vec<R>,
    existing_keys: &HashSet<String>,
) -> (Vec<R>, Vec<R>) {
    records
        .into_iter()
        .partition(|r| !existing_keys.contains(r.natural_key()))
}

/// Batch import orchestrator over a durable store.
pub struct BulkReconciler<R, S>
where
    R: VersionedRecord,
    S: DurableStore<R>,
{
    store: Arc<S>,
    config: CoreConfig,
    _record: PhantomData<fn() -> R>,
}

impl<R, S> BulkReconciler<R, S>
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

    /// Reconcile one payload for a tenant.
    ///
    /// `merge` folds an incoming payload record onto the live record it
    /// duplicates; the reconciler stamps the update audit afterwards.
    /// Fresh records get a guid and a creation audit before the batch
    /// insert.
    #[instrument(skip(self, records, merge), fields(tenant = %tenant, module = R::collection_name(), payload = records.len()))]
    pub async fn reconcile<F>(
        &self,
        tenant: &str,
        actor: &str,
        records: Vec<R>,
        merge: F,
    ) -> Result<BulkSummary>
    where
        F: Fn(&mut R, &R),
    {
        let started = Instant::now();
        let mut summary = BulkSummary::default();
        if records.is_empty() {
            return Ok(summary);
        }

        let (unique, duplicates) = filter_duplicate(records);
        summary.payload_duplicates = duplicates;

        let existing_keys = self
            .existing_keys(tenant, unique.iter().map(|r| r.natural_key().to_string()))
            .await?;
        let (to_create, to_update) = prepare_payload_data(unique, &existing_keys);

        for incoming in to_update {
            let key = incoming.natural_key().to_string();
            match self.apply_update(tenant, actor, &incoming, &merge).await {
                Ok(()) => summary.updated.push(key),
                Err(e) => {
                    warn!(key = %key, error = %e, "bulk update failed; continuing");
                    summary.update_failed.push(key);
                }
            }
        }

        if !to_create.is_empty() {
            let mut docs = Vec::with_capacity(to_create.len());
            let now = Utc::now();
            for mut doc in to_create {
                if doc.guid().is_empty() {
                    doc.set_guid(new_guid());
                }
                *doc.audit_mut() = crate::record::Audit::created(actor, now);
                summary.created.push(doc.natural_key().to_string());
                docs.push(doc);
            }

            with_timeout("bulk_create_batch", self.config.op_timeout(), async {
                self.store.create_batch(docs).await.map_err(Into::into)
            })
            .await?;
        }

        crate::metrics::record_reconcile(
            R::collection_name(),
            summary.created.len(),
            summary.updated.len(),
            summary.update_failed.len(),
            summary.payload_duplicates.len(),
            started.elapsed(),
        );
        Ok(summary)
    }

    /// Which of the given keys already exist (live) in the store.
    /// Queried in chunks so an arbitrarily large payload never builds an
    /// unbounded IN clause.
    async fn existing_keys(
        &self,
        tenant: &str,
        keys: impl Iterator<Item = String>,
    ) -> Result<HashSet<String>> {
        let keys: Vec<String> = keys.collect();
        let mut existing = HashSet::new();

        for chunk in keys.chunks(EXISTS_BATCH) {
            let query = RecordQuery::new(tenant, RecordFilter::NaturalKeyIn(chunk.to_vec()));
            let window = Window {
                offset: 0,
                limit: chunk.len() as u64,
            };
            let page = with_timeout("bulk_existing_keys", self.config.op_timeout(), async {
                self.store
                    .find_page(query, SortSpec::asc(SortField::NaturalKey), window)
                    .await
                    .map_err(Into::into)
            })
            .await?;

            existing.extend(page.records.iter().map(|r| r.natural_key().to_string()));
        }
        Ok(existing)
    }

    /// Fetch the live record behind a key, merge the payload onto it,
    /// write it back. A record that vanished between the batched check
    /// and now counts as a failure of this record only.
    async fn apply_update<F>(&self, tenant: &str, actor: &str, incoming: &R, merge: &F) -> Result<()>
    where
        F: Fn(&mut R, &R),
    {
        let query = RecordQuery::new(
            tenant,
            RecordFilter::NaturalKeyExact(incoming.natural_key().to_string()),
        );
        let found = with_timeout("bulk_fetch_existing", self.config.op_timeout(), async {
            self.store
                .find_one(query, SortSpec::asc(SortField::NaturalKey))
                .await
                .map_err(Into::into)
        })
        .await?;

        let mut current = found.ok_or_else(|| crate::error::MasterSyncError::NotFound {
            entity: R::collection_name(),
            key: incoming.natural_key().to_string(),
        })?;

        merge(&mut current, incoming);
        current.audit_mut().mark_updated(actor, Utc::now());

        let guid = current.guid().to_string();
        with_timeout("bulk_update_existing", self.config.op_timeout(), async {
            self.store
                .update(tenant, &guid, current)
                .await
                .map_err(Into::into)
        })
        .await
    }
}
