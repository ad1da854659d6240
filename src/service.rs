// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Generic record service tying the components together.
//!
//! [`RecordService`] is the front door for one document type: it owns the
//! durable store, the advisory cache, and the event publisher, and wires
//! the sequence generator, change-feed tracker, dirty-flag cache, and
//! bulk reconciler on top of them.
//!
//! Every mutation follows the same shape: the durable write happens on
//! the request path under the operation deadline, then the side effects
//! (event publication, dirty marking, counter commit) run detached. A
//! caller gets its answer as soon as the write lands; side-effect
//! failures are logged and never surface. The returned [`Mutation`]
//! carries the side-effect join handles so tests can await them.

use crate::cache::CacheStore;
use crate::changefeed::ChangeFeedTracker;
use crate::config::CoreConfig;
use crate::deadline::with_timeout;
use crate::dirty::DirtyFlagCache;
use crate::error::{MasterSyncError, Result};
use crate::events::{topic, ChangeKind, EventPublisher};
use crate::reconcile::{BulkReconciler, BulkSummary};
use crate::record::{new_guid, Audit, DeleteMarker, VersionedRecord};
use crate::sequence::SequenceGenerator;
use crate::store::{DurableStore, RecordFilter, RecordQuery, SortField, SortSpec};
use crate::task::DetachedTasks;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{instrument, warn};

/// A completed mutation plus its in-flight side effects.
///
/// Production callers take `record` and drop the handles; the detached
/// tasks finish on their own. Tests await the handles for determinism.
#[derive(Debug)]
pub struct Mutation<T> {
    pub record: T,
    pub side_effects: Vec<JoinHandle<()>>,
}

impl<T> Mutation<T> {
    /// Await all side effects, for tests and ordered shutdown.
    pub async fn settled(self) -> T {
        for handle in self.side_effects {
            // Detached tasks never panic out of their own error handling.
            let _ = handle.await;
        }
        self.record
    }
}

/// One document type's synchronization surface.
pub struct RecordService<R, S, C, P>
where
    R: VersionedRecord + Serialize,
    S: DurableStore<R>,
    C: CacheStore,
    P: EventPublisher,
{
    store: Arc<S>,
    publisher: Arc<P>,
    sequence: SequenceGenerator<R, S, C>,
    feed: ChangeFeedTracker<R, S>,
    dirty: DirtyFlagCache<C>,
    reconciler: BulkReconciler<R, S>,
    config: CoreConfig,
    tasks: DetachedTasks,
}

impl<R, S, C, P> RecordService<R, S, C, P>
where
    R: VersionedRecord + Serialize,
    S: DurableStore<R>,
    C: CacheStore,
    P: EventPublisher,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, publisher: Arc<P>, config: CoreConfig) -> Self {
        Self {
            sequence: SequenceGenerator::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                config.clone(),
            ),
            feed: ChangeFeedTracker::new(Arc::clone(&store), config.clone()),
            dirty: DirtyFlagCache::new(Arc::clone(&cache)),
            reconciler: BulkReconciler::new(Arc::clone(&store), config.clone()),
            store,
            publisher,
            config,
            tasks: DetachedTasks::new(),
        }
    }

    /// The change feeds for this document type.
    pub fn feed(&self) -> &ChangeFeedTracker<R, S> {
        &self.feed
    }

    /// The sequence generator, for callers that mint numbers outside the
    /// create path (e.g. previewing the next document number).
    pub fn sequence(&self) -> &SequenceGenerator<R, S, C> {
        &self.sequence
    }

    /// Persist a new record.
    ///
    /// A missing guid is minted; the audit block is always replaced with
    /// a fresh creation stamp. A natural-key collision surfaces as
    /// [`MasterSyncError::Conflict`].
    #[instrument(skip(self, doc), fields(tenant = %tenant, module = R::collection_name()))]
    pub async fn create(&self, tenant: &str, actor: &str, mut doc: R) -> Result<Mutation<R>> {
        if doc.guid().is_empty() {
            doc.set_guid(new_guid());
        }
        *doc.audit_mut() = Audit::created(actor, Utc::now());

        let to_store = doc.clone();
        with_timeout("create_record", self.config.op_timeout(), async {
            self.store.create(to_store).await.map_err(Into::into)
        })
        .await?;

        let side_effects = self.after_mutation(tenant, ChangeKind::Created, &doc, None);
        Ok(Mutation {
            record: doc,
            side_effects,
        })
    }

    /// Mint a document number under `prefix` and persist the record
    /// carrying it.
    ///
    /// `assign` writes the minted number into the document, normally as
    /// its natural key. On success the counter is committed to the cache
    /// detached. A `Conflict` (from the backstop or the store's
    /// uniqueness constraint) means the number lost a race; the caller
    /// retries the whole call so a fresh number is minted.
    #[instrument(skip(self, doc, assign), fields(tenant = %tenant, prefix = %prefix))]
    pub async fn create_numbered<F>(
        &self,
        tenant: &str,
        actor: &str,
        prefix: &str,
        mut doc: R,
        assign: F,
    ) -> Result<Mutation<R>>
    where
        F: FnOnce(&mut R, &str),
    {
        let minted = self.sequence.next_doc_no(tenant, prefix).await?;
        assign(&mut doc, &minted.doc_no);

        if doc.guid().is_empty() {
            doc.set_guid(new_guid());
        }
        *doc.audit_mut() = Audit::created(actor, Utc::now());

        let to_store = doc.clone();
        with_timeout("create_record", self.config.op_timeout(), async {
            self.store.create(to_store).await.map_err(Into::into)
        })
        .await?;

        let side_effects = self.after_mutation(
            tenant,
            ChangeKind::Created,
            &doc,
            Some((prefix.to_string(), minted.number)),
        );
        Ok(Mutation {
            record: doc,
            side_effects,
        })
    }

    /// Replace the record behind a guid.
    ///
    /// The stored creation audit is preserved and an update stamp added;
    /// the incoming document's own audit block is ignored.
    #[instrument(skip(self, doc), fields(tenant = %tenant, module = R::collection_name(), guid = %guid))]
    pub async fn update(
        &self,
        tenant: &str,
        actor: &str,
        guid: &str,
        mut doc: R,
    ) -> Result<Mutation<R>> {
        let existing = self.find_by_guid(tenant, guid).await?;

        doc.set_guid(existing.guid().to_string());
        *doc.audit_mut() = existing.audit().clone();
        doc.audit_mut().mark_updated(actor, Utc::now());

        let to_store = doc.clone();
        with_timeout("update_record", self.config.op_timeout(), async {
            self.store
                .update(tenant, guid, to_store)
                .await
                .map_err(Into::into)
        })
        .await?;

        let side_effects = self.after_mutation(tenant, ChangeKind::Updated, &doc, None);
        Ok(Mutation {
            record: doc,
            side_effects,
        })
    }

    /// Soft-delete the record behind a guid.
    ///
    /// The published event carries only the identity marker, never the
    /// deleted payload.
    #[instrument(skip(self), fields(tenant = %tenant, module = R::collection_name(), guid = %guid))]
    pub async fn soft_delete(
        &self,
        tenant: &str,
        actor: &str,
        guid: &str,
    ) -> Result<Mutation<DeleteMarker>> {
        let existing = self.find_by_guid(tenant, guid).await?;

        let removed = with_timeout("soft_delete_record", self.config.op_timeout(), async {
            self.store
                .soft_delete(tenant, guid, actor)
                .await
                .map_err(Into::into)
        })
        .await?;
        if !removed {
            return Err(MasterSyncError::NotFound {
                entity: R::collection_name(),
                key: guid.to_string(),
            });
        }

        let marker = DeleteMarker {
            guid: existing.guid().to_string(),
            natural_key: existing.natural_key().to_string(),
            deleted_at: Utc::now(),
        };

        let mut side_effects = Vec::with_capacity(2);
        if let Some(handle) =
            self.publish_detached(ChangeKind::Deleted, marker.guid.clone(), &marker)
        {
            side_effects.push(handle);
        }
        side_effects.push(self.dirty.mark_dirty(tenant, R::collection_name()));

        Ok(Mutation {
            record: marker,
            side_effects,
        })
    }

    /// Reconcile an imported payload, then announce the import.
    ///
    /// The bulk-imported event carries the summary, not the records;
    /// interested consumers pull the change feed.
    #[instrument(skip(self, records, merge), fields(tenant = %tenant, module = R::collection_name(), payload = records.len()))]
    pub async fn bulk_import<F>(
        &self,
        tenant: &str,
        actor: &str,
        records: Vec<R>,
        merge: F,
    ) -> Result<Mutation<BulkSummary>>
    where
        F: Fn(&mut R, &R),
    {
        let summary = self
            .reconciler
            .reconcile(tenant, actor, records, merge)
            .await?;

        let mut side_effects = Vec::with_capacity(2);
        if let Some(handle) =
            self.publish_detached(ChangeKind::BulkImported, tenant.to_string(), &summary)
        {
            side_effects.push(handle);
        }
        side_effects.push(self.dirty.mark_dirty(tenant, R::collection_name()));

        Ok(Mutation {
            record: summary,
            side_effects,
        })
    }

    async fn find_by_guid(&self, tenant: &str, guid: &str) -> Result<R> {
        let query = RecordQuery::new(tenant, RecordFilter::Guid(guid.to_string()));
        let found = with_timeout("find_record", self.config.op_timeout(), async {
            self.store
                .find_one(query, SortSpec::asc(SortField::NaturalKey))
                .await
                .map_err(Into::into)
        })
        .await?;

        found.ok_or_else(|| MasterSyncError::NotFound {
            entity: R::collection_name(),
            key: guid.to_string(),
        })
    }

    /// Spawn the standard post-mutation side effects: publish the change
    /// event, mark the module dirty, and (for numbered creates) commit
    /// the sequence counter.
    fn after_mutation(
        &self,
        tenant: &str,
        kind: ChangeKind,
        doc: &R,
        counter: Option<(String, i64)>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(3);

        if let Some(handle) = self.publish_detached(kind, doc.guid().to_string(), doc) {
            handles.push(handle);
        }
        handles.push(self.dirty.mark_dirty(tenant, R::collection_name()));
        if let Some((prefix, number)) = counter {
            handles.push(self.sequence.commit(tenant, &prefix, number));
        }
        handles
    }

    /// Serialize and publish one event detached. A serialization failure
    /// is logged and drops the event; it never fails the mutation.
    fn publish_detached<T: Serialize>(
        &self,
        kind: ChangeKind,
        key: String,
        payload: &T,
    ) -> Option<JoinHandle<()>> {
        let event_topic = topic(R::collection_name(), kind);
        let payload = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(topic = %event_topic, error = %e, "event payload failed to serialize; dropping");
                return None;
            }
        };

        let publisher = Arc::clone(&self.publisher);
        Some(self.tasks.spawn("publish_event", async move {
            let result = publisher.publish(&event_topic, &key, payload).await;
            crate::metrics::record_event_publish(&event_topic, result.is_ok());
            result
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoOpCache;
    use crate::events::{BoxFuture as PublishFuture, PublishError};
    use crate::pagination::Window;
    use crate::record::test_support::Item;
    use crate::store::{BoxFuture as StoreFuture, QueryPage, StoreError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Guid-keyed store fake covering the service paths.
    #[derive(Default)]
    struct FakeStore {
        items: Mutex<HashMap<String, Item>>,
    }

    impl DurableStore<Item> for FakeStore {
        fn find_one(&self, query: RecordQuery, _sort: SortSpec) -> StoreFuture<'_, Option<Item>> {
            let items = self.items.lock().unwrap();
            let found = items
                .values()
                .filter(|i| i.tenant == query.tenant && !i.audit.is_deleted())
                .find(|i| match &query.filter {
                    RecordFilter::Guid(g) => i.guid == *g,
                    RecordFilter::NaturalKeyExact(k) => i.code == *k,
                    RecordFilter::NaturalKeyPrefix(p) => i.code.starts_with(p.as_str()),
                    _ => false,
                })
                .cloned();
            Box::pin(async move { Ok(found) })
        }

        fn find_page(
            &self,
            _query: RecordQuery,
            _sort: SortSpec,
            _window: Window,
        ) -> StoreFuture<'_, QueryPage<Item>> {
            Box::pin(async move {
                Ok(QueryPage {
                    records: Vec::new(),
                    total: 0,
                })
            })
        }

        fn create(&self, doc: Item) -> StoreFuture<'_, ()> {
            let mut items = self.items.lock().unwrap();
            let result = if items
                .values()
                .any(|i| i.code == doc.code && !i.audit.is_deleted())
            {
                Err(StoreError::Conflict(doc.code.clone()))
            } else {
                items.insert(doc.guid.clone(), doc);
                Ok(())
            };
            Box::pin(async move { result })
        }

        fn create_batch(&self, docs: Vec<Item>) -> StoreFuture<'_, ()> {
            let mut items = self.items.lock().unwrap();
            for doc in docs {
                items.insert(doc.guid.clone(), doc);
            }
            Box::pin(async move { Ok(()) })
        }

        fn update(&self, _tenant: &str, guid: &str, doc: Item) -> StoreFuture<'_, ()> {
            self.items.lock().unwrap().insert(guid.to_string(), doc);
            Box::pin(async move { Ok(()) })
        }

        fn soft_delete(&self, _tenant: &str, guid: &str, actor: &str) -> StoreFuture<'_, bool> {
            let mut items = self.items.lock().unwrap();
            let removed = match items.get_mut(guid) {
                Some(item) if !item.audit.is_deleted() => {
                    item.audit.mark_deleted(actor, Utc::now());
                    true
                }
                _ => false,
            };
            Box::pin(async move { Ok(removed) })
        }
    }

    /// Publisher recording (topic, key) pairs.
    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<(String, String)>>,
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, topic: &str, key: &str, _payload: Vec<u8>) -> PublishFuture<'_, ()> {
            self.events
                .lock()
                .unwrap()
                .push((topic.to_string(), key.to_string()));
            Box::pin(async move { Ok::<_, PublishError>(()) })
        }
    }

    type TestService = RecordService<Item, FakeStore, NoOpCache, RecordingPublisher>;

    fn service() -> (Arc<RecordingPublisher>, TestService) {
        let publisher = Arc::new(RecordingPublisher::default());
        let svc = RecordService::new(
            Arc::new(FakeStore::default()),
            Arc::new(NoOpCache),
            Arc::clone(&publisher),
            CoreConfig::for_testing(),
        );
        (publisher, svc)
    }

    #[tokio::test]
    async fn test_create_mints_guid_and_stamps_audit() {
        let (publisher, svc) = service();
        let mut doc = Item::new("shop1", "P001", "Espresso", "ignored");
        doc.guid.clear();

        let created = svc.create("shop1", "alice", doc).await.unwrap().settled().await;

        assert!(!created.guid.is_empty());
        assert_eq!(created.audit.created_by, "alice");

        let events = publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "item.created");
        assert_eq!(events[0].1, created.guid);
    }

    #[tokio::test]
    async fn test_create_duplicate_key_conflicts() {
        let (_, svc) = service();
        svc.create("shop1", "alice", Item::new("shop1", "P001", "Espresso", "a"))
            .await
            .unwrap()
            .settled()
            .await;

        let err = svc
            .create("shop1", "alice", Item::new("shop1", "P001", "Other", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, MasterSyncError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_create_numbered_assigns_sequence() {
        let (_, svc) = service();

        let first = svc
            .create_numbered(
                "shop1",
                "alice",
                "SI20240601",
                Item::new("shop1", "", "Sale", "a"),
                |doc, n| doc.code = n.to_string(),
            )
            .await
            .unwrap()
            .settled()
            .await;
        assert_eq!(first.code, "SI2024060100001");

        let second = svc
            .create_numbered(
                "shop1",
                "alice",
                "SI20240601",
                Item::new("shop1", "", "Sale", "a"),
                |doc, n| doc.code = n.to_string(),
            )
            .await
            .unwrap()
            .settled()
            .await;
        assert_eq!(second.code, "SI2024060100002");
    }

    #[tokio::test]
    async fn test_update_preserves_creation_audit() {
        let (publisher, svc) = service();
        let created = svc
            .create("shop1", "alice", Item::new("shop1", "P001", "Espresso", "a"))
            .await
            .unwrap()
            .settled()
            .await;

        let mut incoming = Item::new("shop1", "P001", "Double espresso", "ignored");
        incoming.guid = "stale-guid".to_string();

        let updated = svc
            .update("shop1", "bob", &created.guid, incoming)
            .await
            .unwrap()
            .settled()
            .await;

        assert_eq!(updated.guid, created.guid);
        assert_eq!(updated.name, "Double espresso");
        assert_eq!(updated.audit.created_by, "alice");
        assert_eq!(updated.audit.updated_by.as_deref(), Some("bob"));

        let events = publisher.events.lock().unwrap();
        assert_eq!(events.last().unwrap().0, "item.updated");
    }

    #[tokio::test]
    async fn test_update_missing_record_not_found() {
        let (_, svc) = service();
        let err = svc
            .update(
                "shop1",
                "bob",
                "no-such-guid",
                Item::new("shop1", "P001", "x", "a"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MasterSyncError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_soft_delete_publishes_marker_only() {
        let (publisher, svc) = service();
        let created = svc
            .create("shop1", "alice", Item::new("shop1", "P001", "Espresso", "a"))
            .await
            .unwrap()
            .settled()
            .await;

        let marker = svc
            .soft_delete("shop1", "alice", &created.guid)
            .await
            .unwrap()
            .settled()
            .await;

        assert_eq!(marker.guid, created.guid);
        assert_eq!(marker.natural_key, "P001");

        let events = publisher.events.lock().unwrap();
        assert_eq!(events.last().unwrap().0, "item.deleted");

        // The record is gone from live lookups.
        let err = svc
            .soft_delete("shop1", "alice", &created.guid)
            .await
            .unwrap_err();
        assert!(matches!(err, MasterSyncError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_bulk_import_announces_summary() {
        let (publisher, svc) = service();

        let records = vec![
            Item::new("shop1", "A", "one", "importer"),
            Item::new("shop1", "B", "two", "importer"),
        ];
        let summary = svc
            .bulk_import("shop1", "importer", records, |e, i| e.name = i.name.clone())
            .await
            .unwrap()
            .settled()
            .await;

        assert_eq!(summary.created.len(), 2);
        let events = publisher.events.lock().unwrap();
        assert_eq!(events.last().unwrap().0, "item.bulk-imported");
        assert_eq!(events.last().unwrap().1, "shop1");
    }
}
