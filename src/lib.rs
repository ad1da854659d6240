//! # MasterSync Core
//!
//! Synchronization and sequencing primitives for multi-tenant
//! point-of-sale backends: sequential document numbers, incremental
//! change feeds, dirty-flag markers, and bulk payload reconciliation.
//!
//! ## Architecture
//!
//! The core sits between a durable store (the source of truth), an
//! advisory cache, and a message broker, all injected as ports:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           mastersync-core                            │
//! │                                                                      │
//! │  ┌───────────────────┐  ┌───────────────────┐  ┌──────────────────┐  │
//! │  │ SequenceGenerator │  │ ChangeFeedTracker │  │ BulkReconciler   │  │
//! │  │ (doc numbers)     │  │ (since-T queries) │  │ (batch imports)  │  │
//! │  └───────────────────┘  └───────────────────┘  └──────────────────┘  │
//! │            │                      │                     │            │
//! │            └──────────────┬───────┴─────────────────────┘            │
//! │                           ▼                                          │
//! │                   ┌───────────────┐      ┌────────────────────────┐  │
//! │                   │ RecordService │─────►│ DetachedTasks          │  │
//! │                   │ (per doc type)│      │ (publish, dirty marks, │  │
//! │                   └───────────────┘      │  counter commits)      │  │
//! │                           │              └────────────────────────┘  │
//! └───────────────────────────┼──────────────────────────────────────────┘
//!                             ▼
//!          DurableStore     CacheStore     EventPublisher
//!          (uniqueness)     (advisory)     (best-effort)
//! ```
//!
//! ## Write path vs. side effects
//!
//! 1. **Request path**: durable writes run under a per-call deadline and
//!    their failures surface to the caller.
//! 2. **Detached path**: event publication, dirty marking, and counter
//!    caching run fire-and-forget; failures are logged and swallowed.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mastersync_core::{CoreConfig, RecordService};
//! use mastersync_core::cache::NoOpCache;
//! use mastersync_core::events::NoOpPublisher;
//! use std::sync::Arc;
//!
//! # async fn run<R, S>(store: Arc<S>)
//! # where
//! #     R: mastersync_core::record::VersionedRecord + serde::Serialize,
//! #     S: mastersync_core::store::DurableStore<R>,
//! # {
//! let service: RecordService<R, S, _, _> = RecordService::new(
//!     store,
//!     Arc::new(NoOpCache),
//!     Arc::new(NoOpPublisher),
//!     CoreConfig::default(),
//! );
//! # }
//! ```

pub mod cache;
pub mod changefeed;
pub mod config;
pub mod deadline;
pub mod dirty;
pub mod error;
pub mod events;
pub mod metrics;
pub mod pagination;
pub mod reconcile;
pub mod record;
pub mod sequence;
pub mod service;
pub mod store;
pub mod task;

// Re-exports for convenience
pub use cache::{CacheStore, NoOpCache};
pub use changefeed::{ChangeFeedTracker, DeletedPage, FeedPage};
pub use config::{CoreConfig, PageConfig};
pub use dirty::DirtyFlagCache;
pub use error::{MasterSyncError, Result};
pub use events::{ChangeKind, EventPublisher, NoOpPublisher};
pub use pagination::{PageMeta, Pageable, PageableStep};
pub use reconcile::{filter_duplicate, prepare_payload_data, BulkReconciler, BulkSummary};
pub use record::{Audit, DeleteMarker, VersionedRecord};
pub use sequence::{doc_no_prefix, DocNo, SequenceGenerator};
pub use service::{Mutation, RecordService};
pub use store::{DurableStore, RecordFilter, RecordQuery, SortSpec};
pub use task::DetachedTasks;
