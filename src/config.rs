//! Configuration for the master-sync core.
//!
//! This module defines the configuration passed to
//! [`RecordService::new()`](crate::service::RecordService::new) and the
//! standalone components. It can be constructed programmatically or
//! deserialized from YAML/JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use mastersync_core::config::CoreConfig;
//!
//! let config = CoreConfig {
//!     op_timeout_sec: 10,
//!     ..Default::default()
//! };
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! op_timeout_sec: 15
//! doc_no_cache_ttl_sec: 86400
//! page:
//!   default_limit: 20
//!   max_limit: 1000
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// CoreConfig: top-level tunables
// ═══════════════════════════════════════════════════════════════════════════════

/// Tunable parameters shared by all sync components.
///
/// # Fields
///
/// - `op_timeout_sec`: Per-call deadline for durable-store and hot-path cache I/O.
/// - `doc_no_cache_ttl_sec`: TTL applied to cached document-number counters.
/// - `page`: Defaults and caps for paginated change-feed queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Deadline for each primary-path store operation, in seconds.
    /// Detached side-effect tasks are not bounded by this.
    #[serde(default = "default_op_timeout_sec")]
    pub op_timeout_sec: u64,

    /// TTL for cached per-(tenant, prefix) counters, in seconds.
    /// A day by default: counters reset naturally with the date prefix.
    #[serde(default = "default_doc_no_cache_ttl_sec")]
    pub doc_no_cache_ttl_sec: u64,

    /// Pagination defaults for change-feed queries.
    #[serde(default)]
    pub page: PageConfig,
}

fn default_op_timeout_sec() -> u64 {
    15
}

fn default_doc_no_cache_ttl_sec() -> u64 {
    86_400 // 24 hours
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            op_timeout_sec: 15,
            doc_no_cache_ttl_sec: 86_400,
            page: PageConfig::default(),
        }
    }
}

impl CoreConfig {
    /// The per-operation deadline as a [`Duration`].
    pub fn op_timeout(&self) -> Duration {
        Duration::from_secs(self.op_timeout_sec)
    }

    /// The counter-cache TTL as a [`Duration`].
    pub fn doc_no_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.doc_no_cache_ttl_sec)
    }

    /// Create a config with a short deadline for testing.
    pub fn for_testing() -> Self {
        Self {
            op_timeout_sec: 2,
            doc_no_cache_ttl_sec: 60,
            page: PageConfig::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PageConfig: pagination defaults
// ═══════════════════════════════════════════════════════════════════════════════

/// Defaults and caps for paginated queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// Page size used when the caller supplies none.
    #[serde(default = "default_page_limit")]
    pub default_limit: u64,

    /// Hard cap on page size. Requests above this are clamped.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
}

fn default_page_limit() -> u64 {
    20
}

fn default_max_limit() -> u64 {
    1000
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 1000,
        }
    }
}

impl PageConfig {
    /// Clamp a requested page size to `[1, max_limit]`, substituting the
    /// default for zero.
    pub fn clamp_limit(&self, requested: u64) -> u64 {
        if requested == 0 {
            self.default_limit
        } else {
            requested.min(self.max_limit)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
