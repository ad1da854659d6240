//! In-memory `DurableStore` with real semantics.
//!
//! Unlike the per-module fakes in unit tests, this store implements the
//! whole port faithfully: every filter variant, the three sort fields,
//! windowing with totals, soft-delete visibility rules, and natural-key
//! uniqueness enforced on both create paths (all-or-nothing for the
//! batch path).

use chrono::Utc;
use mastersync_core::pagination::Window;
use mastersync_core::record::VersionedRecord;
use mastersync_core::store::{
    BoxFuture, DurableStore, QueryPage, RecordFilter, RecordQuery, SortDir, SortField, SortSpec,
    StoreError,
};
use std::sync::Mutex;

pub struct MemoryStore<R> {
    records: Mutex<Vec<R>>,
    /// When set, update() fails for records with these natural keys.
    pub fail_update_keys: Mutex<Vec<String>>,
}

impl<R: VersionedRecord> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_update_keys: Mutex::new(Vec::new()),
        }
    }

    /// Number of records, deleted ones included.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn snapshot(&self) -> Vec<R> {
        self.records.lock().unwrap().clone()
    }

    fn matches(record: &R, query: &RecordQuery) -> bool {
        if record.tenant_id() != query.tenant {
            return false;
        }
        let deleted = record.audit().is_deleted();
        match &query.filter {
            RecordFilter::All => !deleted,
            RecordFilter::Guid(g) => !deleted && record.guid() == g,
            RecordFilter::NaturalKeyExact(k) => !deleted && record.natural_key() == k,
            RecordFilter::NaturalKeyPrefix(p) => !deleted && record.natural_key().starts_with(p.as_str()),
            RecordFilter::NaturalKeyIn(keys) => {
                !deleted && keys.iter().any(|k| record.natural_key() == k)
            }
            RecordFilter::CreatedOrUpdatedSince(since) => {
                !deleted && record.audit().last_activity_at() > *since
            }
            RecordFilter::DeletedSince(since) => record
                .audit()
                .deleted_at
                .map(|d| d > *since)
                .unwrap_or(false),
        }
    }

    fn sorted(mut records: Vec<R>, sort: SortSpec) -> Vec<R> {
        match sort.field {
            SortField::NaturalKey => records.sort_by(|a, b| a.natural_key().cmp(b.natural_key())),
            SortField::LastActivity => {
                records.sort_by_key(|r| r.audit().last_activity_at());
            }
            SortField::DeletedAt => {
                records.sort_by_key(|r| r.audit().deleted_at.unwrap_or(r.audit().created_at));
            }
        }
        if sort.dir == SortDir::Desc {
            records.reverse();
        }
        records
    }

    fn conflict_key(records: &[R], doc: &R) -> Option<String> {
        records
            .iter()
            .filter(|r| !r.audit().is_deleted() && r.tenant_id() == doc.tenant_id())
            .find(|r| r.natural_key() == doc.natural_key())
            .map(|r| r.natural_key().to_string())
    }
}

impl<R: VersionedRecord> DurableStore<R> for MemoryStore<R> {
    fn find_one(&self, query: RecordQuery, sort: SortSpec) -> BoxFuture<'_, Option<R>> {
        let records = self.records.lock().unwrap();
        let matched: Vec<R> = records
            .iter()
            .filter(|r| Self::matches(r, &query))
            .cloned()
            .collect();
        let found = Self::sorted(matched, sort).into_iter().next();
        Box::pin(async move { Ok(found) })
    }

    fn find_page(
        &self,
        query: RecordQuery,
        sort: SortSpec,
        window: Window,
    ) -> BoxFuture<'_, QueryPage<R>> {
        let records = self.records.lock().unwrap();
        let matched: Vec<R> = records
            .iter()
            .filter(|r| Self::matches(r, &query))
            .cloned()
            .collect();
        let total = matched.len() as u64;
        let page: Vec<R> = Self::sorted(matched, sort)
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect();
        Box::pin(async move {
            Ok(QueryPage {
                records: page,
                total,
            })
        })
    }

    fn create(&self, doc: R) -> BoxFuture<'_, ()> {
        let mut records = self.records.lock().unwrap();
        let result = match Self::conflict_key(&records, &doc) {
            Some(key) => Err(StoreError::Conflict(key)),
            None => {
                records.push(doc);
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn create_batch(&self, docs: Vec<R>) -> BoxFuture<'_, ()> {
        let mut records = self.records.lock().unwrap();
        // All-or-nothing: check every key before inserting any record.
        let mut conflict = None;
        for doc in &docs {
            if let Some(key) = Self::conflict_key(&records, doc) {
                conflict = Some(key);
                break;
            }
        }
        let result = match conflict {
            Some(key) => Err(StoreError::Conflict(key)),
            None => {
                records.extend(docs);
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn update(&self, tenant: &str, guid: &str, doc: R) -> BoxFuture<'_, ()> {
        let failing = self
            .fail_update_keys
            .lock()
            .unwrap()
            .contains(&doc.natural_key().to_string());
        let result = if failing {
            Err(StoreError::Unavailable("injected update failure".to_string()))
        } else {
            let mut records = self.records.lock().unwrap();
            match records
                .iter_mut()
                .find(|r| r.tenant_id() == tenant && r.guid() == guid)
            {
                Some(slot) => {
                    *slot = doc;
                    Ok(())
                }
                None => Err(StoreError::Unavailable(format!(
                    "no record with guid {guid}"
                ))),
            }
        };
        Box::pin(async move { result })
    }

    fn soft_delete(&self, tenant: &str, guid: &str, actor: &str) -> BoxFuture<'_, bool> {
        let mut records = self.records.lock().unwrap();
        let removed = match records
            .iter_mut()
            .find(|r| r.tenant_id() == tenant && r.guid() == guid && !r.audit().is_deleted())
        {
            Some(record) => {
                record.audit_mut().mark_deleted(actor, Utc::now());
                true
            }
            None => false,
        };
        Box::pin(async move { Ok(removed) })
    }
}
