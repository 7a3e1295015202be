//! Soft-failing wrapper over the shared KV backend.
//!
//! Callers above this wrapper never see a backend error: a failed GET is
//! a miss, a failed SET is a dropped write, a failed lock acquisition is
//! "not acquired". The read path stays correct (just slower) while the
//! backend is unreachable.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::infra::kv::{KvBackend, KvError};

const METRIC_KV_SOFT_FAIL: &str = "veglia_kv_soft_fail_total";

/// Cache-facing view of the KV backend with soft-fail semantics.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KvBackend>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Read and decode a value together with its remaining TTL.
    ///
    /// Returns `None` on absence, backend failure, or an undecodable
    /// payload. A present value whose TTL probe fails comes back with
    /// `None` remaining, which classifies stale downstream.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<(T, Option<Duration>)> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                soft_fail("get", key, &err);
                return None;
            }
        };

        let value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "Discarding undecodable cache entry");
                return None;
            }
        };

        let remaining = match self.backend.ttl(key).await {
            Ok(remaining) => remaining,
            Err(err) => {
                soft_fail("ttl", key, &err);
                None
            }
        };

        Some((value, remaining))
    }

    /// Serialize and write a value with an expiry. Returns whether the
    /// write reached the backend.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "Failed to encode cache entry");
                return false;
            }
        };

        match self.backend.set_ex(key, &raw, ttl).await {
            Ok(()) => true,
            Err(err) => {
                soft_fail("set_ex", key, &err);
                false
            }
        }
    }

    /// Atomically create the lock key if absent. A backend failure
    /// reports "not acquired" so the caller falls back to polling.
    pub async fn acquire_lock(&self, key: &str, ttl: Duration) -> bool {
        match self.backend.set_nx_ex(key, "1", ttl).await {
            Ok(acquired) => acquired,
            Err(err) => {
                soft_fail("set_nx_ex", key, &err);
                false
            }
        }
    }

    /// Drop the lock key. Best effort: an expired or missing key is fine.
    pub async fn release(&self, key: &str) {
        let keys = [key.to_string()];
        if let Err(err) = self.backend.del(&keys).await {
            soft_fail("del", key, &err);
        }
    }

    /// Delete a batch of keys. Returns whether the backend accepted the
    /// delete.
    pub async fn delete(&self, keys: &[String]) -> bool {
        if keys.is_empty() {
            return true;
        }
        match self.backend.del(keys).await {
            Ok(_) => true,
            Err(err) => {
                soft_fail("del", keys.first().map(String::as_str).unwrap_or(""), &err);
                false
            }
        }
    }
}

fn soft_fail(op: &'static str, key: &str, err: &KvError) {
    counter!(METRIC_KV_SOFT_FAIL).increment(1);
    warn!(
        op,
        key,
        error = %err,
        "KV backend failure treated as cache miss"
    );
}
