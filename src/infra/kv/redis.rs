//! Redis implementation of the key-value backend.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use super::{KvBackend, KvError};

/// Key-value backend over a shared Redis instance.
///
/// Connections are multiplexed; every call clones the connection handle
/// rather than holding it across awaits in callers.
pub struct RedisKvBackend {
    client: redis::Client,
}

impl RedisKvBackend {
    pub fn connect(redis_url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(redis_url).map_err(|err| KvError::new(err.to_string()))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, KvError> {
        self.client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|err| KvError::new(err.to_string()))
    }
}

#[async_trait]
impl KvBackend for RedisKvBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut connection = self.connection().await?;
        connection
            .get(key)
            .await
            .map_err(|err| KvError::new(err.to_string()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut connection = self.connection().await?;
        connection
            .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|err| KvError::new(err.to_string()))
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        let mut connection = self.connection().await?;
        let written: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut connection)
            .await
            .map_err(|err| KvError::new(err.to_string()))?;
        Ok(written.is_some())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, KvError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut connection = self.connection().await?;
        connection
            .del(keys)
            .await
            .map_err(|err| KvError::new(err.to_string()))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        let mut connection = self.connection().await?;
        let remaining: i64 = redis::cmd("TTL")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(|err| KvError::new(err.to_string()))?;
        // -2 means absent, -1 means no expiry; both classify as unknown.
        if remaining > 0 {
            Ok(Some(Duration::from_secs(remaining as u64)))
        } else {
            Ok(None)
        }
    }
}
