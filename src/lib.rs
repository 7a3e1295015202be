//! Veglia keeps watch over who is online.
//!
//! The crate is the caching and coordination core behind a social
//! platform's "who am I following and are they online" reads. It fronts
//! the slow collaborators (relationship service, presence store, profile
//! service) with a stale-while-revalidate page cache backed by a shared
//! key-value store, a stampede lock, an in-process single-flight
//! registry, a rate-limited bulk profile fetcher, and a hot-cache
//! synchronizer that keeps per-subject fast-lookup keys aligned with the
//! last aggregated page.
//!
//! Transport, authentication, and the underlying stores stay behind the
//! trait seams in [`application::sources`] and [`infra::kv`]; embedders
//! wire them up once and construct a single
//! [`FollowingStatusService`](application::service::FollowingStatusService)
//! per process.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

pub use application::service::{FollowingStatusService, ServiceError};
pub use application::status::BulkStatusEntry;
pub use domain::following::{FollowingEntry, FollowingPage, FollowingStatusEntry};
pub use domain::presence::{PresenceStatus, StatusRecord};
pub use domain::profiles::ProfileSnapshot;
pub use domain::subject::SubjectId;
