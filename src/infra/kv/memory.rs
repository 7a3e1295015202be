//! In-memory key-value backend.
//!
//! Mirrors the Redis semantics closely enough for tests and single
//! process embeddings: lazy expiry, set-if-absent, and TTL probes.
//! Expiry uses the tokio clock so tests can drive it under paused time.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::cache::lock::mutex_lock;

use super::{KvBackend, KvError};

const SOURCE: &str = "infra::kv::memory";

#[derive(Debug, Clone)]
struct StoredEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Process-local key-value backend with Redis-like TTL semantics.
#[derive(Default)]
pub struct InMemoryKvBackend {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl InMemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys; test observability.
    pub fn live_len(&self) -> usize {
        let now = Instant::now();
        mutex_lock(&self.entries, SOURCE, "live_len")
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }
}

#[async_trait]
impl KvBackend for InMemoryKvBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = entries.get(key).is_some_and(|entry| entry.is_expired(now));
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let entry = StoredEntry {
            value: value.to_string(),
            expires_at: Some(Instant::now() + ttl),
        };
        mutex_lock(&self.entries, SOURCE, "set_ex").insert(key.to_string(), entry);
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "set_nx_ex");
        let occupied = entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now));
        if occupied {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn del(&self, keys: &[String]) -> Result<u64, KvError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "del");
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key)
                && !entry.is_expired(now)
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "ttl");
        let expired = entries.get(key).is_some_and(|entry| entry.is_expired(now));
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).and_then(|entry| {
            entry
                .expires_at
                .map(|deadline| deadline.saturating_duration_since(now))
        }))
    }
}
