//! Shared test utilities for integration and property tests.
//!
//! This module provides:
//! - An in-memory `DurableStore` with real filter/sort/uniqueness semantics
//! - An in-memory `CacheStore` honoring TTLs
//! - A recording `EventPublisher` for assertions
//! - The `Product` fixture record

// Each test binary compiles its own copy of this module and uses a
// different subset of it.
#![allow(dead_code)]

pub mod fixtures;
pub mod memory_store;

pub use fixtures::*;
pub use memory_store::*;

/// Routes `tracing` output through the test writer so `--nocapture`
/// runs show the library's logs. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .try_init();
}
