//! The versioned-record data model.
//!
//! Every persisted business document carries the same identity and audit
//! shape: a tenant id, a generated guid surrogate, a domain natural key
//! (code, item code, document number), and audit timestamps. Records are
//! never physically removed; "deletion" stamps `deleted_at` so the change
//! feed can report removals to consumers that missed them.
//!
//! Domain types opt in by implementing [`VersionedRecord`]; everything in
//! this crate (sequence generation, change feeds, reconciliation, the
//! generic record service) is written against that trait rather than any
//! concrete document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit fields embedded in every persisted document.
///
/// `created_at`/`created_by` are set exactly once. `updated_at` is stamped
/// on every mutation. A populated `deleted_at` marks the record as
/// soft-deleted; soft-deleted records are invisible to normal lookups and
/// only surface through the deleted change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
}

impl Audit {
    /// Fresh audit block for a newly created record.
    pub fn created(actor: &str, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            created_by: actor.to_string(),
            updated_at: None,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
        }
    }

    /// Stamp an update. Creation fields are preserved.
    pub fn mark_updated(&mut self, actor: &str, now: DateTime<Utc>) {
        self.updated_at = Some(now);
        self.updated_by = Some(actor.to_string());
    }

    /// Stamp a soft delete.
    pub fn mark_deleted(&mut self, actor: &str, now: DateTime<Utc>) {
        self.deleted_at = Some(now);
        self.deleted_by = Some(actor.to_string());
    }

    /// Whether the record is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// The timestamp the created-or-updated feed orders by: the update
    /// time if the record has ever been updated, otherwise creation time.
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Capability set for documents managed by this core.
///
/// The natural key is a business-meaningful unique field, distinct from
/// the guid surrogate; it must be unique within (tenant, not-deleted)
/// scope — the durable store enforces that at persist time.
pub trait VersionedRecord: Clone + Send + Sync + 'static {
    /// Collection/topic name for this document type (e.g. `"product"`).
    fn collection_name() -> &'static str;

    /// The tenant (shop) this record belongs to.
    fn tenant_id(&self) -> &str;

    /// The generated surrogate key.
    fn guid(&self) -> &str;
    fn set_guid(&mut self, guid: String);

    /// The domain natural key (code, document number, ...).
    fn natural_key(&self) -> &str;

    fn audit(&self) -> &Audit;
    fn audit_mut(&mut self) -> &mut Audit;
}

/// Mint a new guid surrogate.
pub fn new_guid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Identity-only projection of a soft-deleted record.
///
/// The deleted change feed returns these instead of full records so that
/// removal notifications never leak business payload fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMarker {
    pub guid: String,
    pub natural_key: String,
    pub deleted_at: DateTime<Utc>,
}

impl DeleteMarker {
    /// Project a soft-deleted record down to its identity.
    ///
    /// Returns `None` for records that are not actually deleted; callers
    /// log and skip those rather than fabricating a timestamp.
    pub fn from_record<R: VersionedRecord>(record: &R) -> Option<Self> {
        record.audit().deleted_at.map(|deleted_at| Self {
            guid: record.guid().to_string(),
            natural_key: record.natural_key().to_string(),
            deleted_at,
        })
    }
}
