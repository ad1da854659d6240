//! Pagination request and envelope types.
//!
//! Two request modes are supported, selected by the calling consumer:
//!
//! - [`Pageable`]: 1-based page/limit with a full [`PageMeta`] envelope
//!   (`{page, limit, total_pages, total_records}`).
//! - [`PageableStep`]: offset/limit with a flat total count, for
//!   streaming-export consumers that walk the whole result set.
//!
//! Limits are clamped against [`crate::config::PageConfig`] by the
//! components that accept these types.

use serde::{Deserialize, Serialize};

/// 1-based page/limit request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pageable {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl Default for Pageable {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl Pageable {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }
    }

    /// Convert to an absolute window. Page 0 is treated as page 1.
    pub fn window(&self) -> Window {
        let page = self.page.max(1);
        Window {
            offset: (page - 1).saturating_mul(self.limit),
            limit: self.limit,
        }
    }
}

/// Offset/limit request for step (streaming export) queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct PageableStep {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

impl PageableStep {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    pub fn window(&self) -> Window {
        Window {
            offset: self.offset,
            limit: self.limit,
        }
    }
}

/// Absolute slice of a result set, as handed to the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

/// Pagination envelope returned alongside page-mode results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMeta {
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
    pub total_records: u64,
}

impl PageMeta {
    /// Build the envelope for a request against a known total.
    pub fn build(pageable: Pageable, total_records: u64) -> Self {
        let limit = pageable.limit;
        let total_pages = if limit == 0 {
            0
        } else {
            total_records.div_ceil(limit)
        };
        Self {
            page: pageable.page.max(1),
            limit,
            total_pages,
            total_records,
        }
    }
}
