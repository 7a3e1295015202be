//! Key-value backend seam.
//!
//! The cache layer talks to one shared key-value store through this
//! trait: plain string values with TTLs and an atomic set-if-absent used
//! as a best-effort mutex. Production runs on Redis
//! ([`redis::RedisKvBackend`]); tests and embedded setups use
//! [`memory::InMemoryKvBackend`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use memory::InMemoryKvBackend;
pub use redis::RedisKvBackend;

#[derive(Debug, Clone, Error)]
#[error("kv backend error: {message}")]
pub struct KvError {
    message: String,
}

impl KvError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Shared key-value store operations used by the cache layer.
///
/// Every operation is fallible; callers above the [`CacheStore`] wrapper
/// never see these errors, they are soft-failed there.
///
/// [`CacheStore`]: crate::cache::store::CacheStore
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// GET: the live value for a key, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// SETEX: write a value with an expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// SET NX EX: write only if the key is absent; true when written.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError>;

    /// DEL: remove keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, KvError>;

    /// TTL: remaining time to live, or `None` when the key is absent or
    /// carries no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError>;
}
