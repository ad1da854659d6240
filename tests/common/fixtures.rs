//! Fixture record type, recording publisher, and in-memory cache.

use chrono::Utc;
use mastersync_core::cache::{BoxFuture as CacheFuture, CacheError, CacheStore};
use mastersync_core::events::{BoxFuture as PublishFuture, EventPublisher, PublishError};
use mastersync_core::record::{new_guid, Audit, VersionedRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A minimal product document, the usual master-data guinea pig.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub tenant: String,
    pub guid: String,
    pub code: String,
    pub name: String,
    pub price: f64,
    pub audit: Audit,
}

impl Product {
    pub fn new(tenant: &str, code: &str, name: &str, price: f64) -> Self {
        Self {
            tenant: tenant.to_string(),
            guid: new_guid(),
            code: code.to_string(),
            name: name.to_string(),
            price,
            audit: Audit::created("fixture", Utc::now()),
        }
    }
}

impl VersionedRecord for Product {
    fn collection_name() -> &'static str {
        "product"
    }

    fn tenant_id(&self) -> &str {
        &self.tenant
    }

    fn guid(&self) -> &str {
        &self.guid
    }

    fn set_guid(&mut self, guid: String) {
        self.guid = guid;
    }

    fn natural_key(&self) -> &str {
        &self.code
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}

/// A recorded publish() call.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub topic: String,
    pub key: String,
    #[allow(dead_code)] // Recorded for payload-shape assertions
    pub payload: Vec<u8>,
}

/// Publisher that records every event for assertions.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PublishedEvent>>,
    pub fail: bool,
}

impl RecordingPublisher {
    /// A publisher whose every publish attempt fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    #[allow(dead_code)]
    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.topic.clone())
            .collect()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> PublishFuture<'_, ()> {
        let result = if self.fail {
            Err(PublishError("injected broker failure".to_string()))
        } else {
            self.events.lock().unwrap().push(PublishedEvent {
                topic: topic.to_string(),
                key: key.to_string(),
                payload,
            });
            Ok(())
        };
        Box::pin(async move { result })
    }
}

/// In-memory cache honoring per-entry TTLs.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (i64, Option<Instant>)>>,
    pub fail: bool,
}

impl MemoryCache {
    /// A cache whose every operation fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Peek at a raw value, expiry ignored. For assertions only.
    pub fn raw(&self, key: &str) -> Option<i64> {
        self.entries.lock().unwrap().get(key).map(|(v, _)| *v)
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> CacheFuture<'_, Option<i64>> {
        let result = if self.fail {
            Err(CacheError("injected cache failure".to_string()))
        } else {
            let entries = self.entries.lock().unwrap();
            Ok(entries.get(key).and_then(|(value, expiry)| {
                match expiry {
                    Some(at) if *at <= Instant::now() => None,
                    _ => Some(*value),
                }
            }))
        };
        Box::pin(async move { result })
    }

    fn set(&self, key: &str, value: i64, ttl: Option<Duration>) -> CacheFuture<'_, ()> {
        let result = if self.fail {
            Err(CacheError("injected cache failure".to_string()))
        } else {
            let expiry = ttl.map(|t| Instant::now() + t);
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value, expiry));
            Ok(())
        };
        Box::pin(async move { result })
    }
}
