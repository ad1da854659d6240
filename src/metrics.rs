//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Document number issuance (cache hits, store fallbacks, conflicts)
//! - Change-feed query volume
//! - Bulk reconciliation outcomes
//! - Dirty-flag markers
//! - Event publishing
//! - Detached task completion
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `mastersync_` and follow Prometheus
//! conventions: counters end in `_total`, gauges represent current state,
//! histograms track distributions.
//!
//! # Usage
//!
//! ```rust,no_run
//! use mastersync_core::metrics;
//!
//! // In the sequence generator after minting a number
//! metrics::record_doc_no_issued("INV", true);
//! ```

use metrics::{counter, histogram};
use std::time::Duration;

/// Record a minted document number. `from_cache` distinguishes the
/// cache-assisted fast path from the durable-store fallback.
pub fn record_doc_no_issued(prefix: &str, from_cache: bool) {
    let source = if from_cache { "cache" } else { "store" };
    counter!("mastersync_doc_no_issued_total", "prefix" => prefix.to_string(), "source" => source)
        .increment(1);
}

/// Record a document-number collision caught by the uniqueness backstop.
pub fn record_doc_no_conflict(prefix: &str) {
    counter!("mastersync_doc_no_conflicts_total", "prefix" => prefix.to_string()).increment(1);
}

/// Record a counter-cache lookup outcome.
pub fn record_counter_cache_lookup(hit: bool) {
    let status = if hit { "hit" } else { "miss" };
    counter!("mastersync_counter_cache_lookups_total", "status" => status).increment(1);
}

/// Record a change-feed page served.
pub fn record_feed_page(module: &str, kind: &str, records: usize, duration: Duration) {
    counter!("mastersync_feed_pages_total", "module" => module.to_string(), "kind" => kind.to_string())
        .increment(1);
    counter!("mastersync_feed_records_total", "module" => module.to_string(), "kind" => kind.to_string())
        .increment(records as u64);
    histogram!("mastersync_feed_query_duration_seconds", "module" => module.to_string())
        .record(duration.as_secs_f64());
}

/// Record a bulk reconciliation with its per-bucket counts.
pub fn record_reconcile(
    module: &str,
    created: usize,
    updated: usize,
    update_failed: usize,
    payload_duplicates: usize,
    duration: Duration,
) {
    let m = module.to_string();

    counter!("mastersync_reconcile_runs_total", "module" => m.clone()).increment(1);
    counter!("mastersync_reconcile_created_total", "module" => m.clone())
        .increment(created as u64);
    counter!("mastersync_reconcile_updated_total", "module" => m.clone())
        .increment(updated as u64);
    counter!("mastersync_reconcile_duplicates_total", "module" => m.clone())
        .increment(payload_duplicates as u64);

    if update_failed > 0 {
        counter!("mastersync_reconcile_update_failures_total", "module" => m.clone())
            .increment(update_failed as u64);
    }

    histogram!("mastersync_reconcile_duration_seconds", "module" => m)
        .record(duration.as_secs_f64());
}

/// Record a dirty-flag marker write attempt.
pub fn record_dirty_mark(module: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("mastersync_dirty_marks_total", "module" => module.to_string(), "status" => status)
        .increment(1);
}

/// Record an event publish attempt.
pub fn record_event_publish(topic: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("mastersync_events_published_total", "topic" => topic.to_string(), "status" => status)
        .increment(1);
}

/// Record completion of a detached side-effect task.
pub fn record_detached_task(label: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("mastersync_detached_tasks_total", "task" => label.to_string(), "status" => status)
        .increment(1);
}

/// Record a primary-path operation exceeding its deadline.
pub fn record_op_timeout(operation: &str) {
    counter!("mastersync_op_timeouts_total", "operation" => operation.to_string()).increment(1);
}

/// Record store-level errors by operation.
pub fn record_store_error(operation: &str) {
    counter!("mastersync_store_errors_total", "operation" => operation.to_string()).increment(1);
}
