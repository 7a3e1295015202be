//! Infrastructure adapters: KV backends, the profile HTTP client, and
//! telemetry bootstrap.

pub mod error;
pub mod kv;
pub mod profile_client;
pub mod telemetry;
