//! Hot-cache synchronizer.
//!
//! Other services resolve "is this subject online" through per-subject
//! hot keys rather than paging through following results. After every
//! successful page-0 build the synchronizer reconciles those keys:
//! subjects that left the page get their keys deleted, everyone on the
//! page gets a refreshed key. The hot cache is an acceleration
//! structure, so nothing here ever fails the surrounding request.

use std::collections::HashSet;
use std::time::Duration;

use metrics::histogram;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::following::FollowingPage;
use crate::domain::presence::PresenceStatus;
use crate::domain::subject::SubjectId;

use super::keys::hot_key;
use super::store::CacheStore;

const METRIC_HOT_SYNC_MS: &str = "veglia_hot_sync_ms";

/// Payload stored under each `hot:{subject}` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotEntry {
    pub status: PresenceStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    pub connection_id: Option<String>,
}

/// Reconciles per-subject hot keys against the latest page-0 result.
pub struct HotCacheSynchronizer {
    store: CacheStore,
    entry_ttl: Duration,
}

impl HotCacheSynchronizer {
    pub fn new(store: CacheStore, entry_ttl: Duration) -> Self {
        Self { store, entry_ttl }
    }

    /// Diff the previous page-0 against the new one, delete hot keys for
    /// subjects that dropped off, and write a fresh key for every
    /// subject on the new page.
    pub async fn sync(
        &self,
        owner: &SubjectId,
        previous: Option<&FollowingPage>,
        current: &FollowingPage,
    ) {
        let started_at = Instant::now();

        let current_ids: HashSet<&SubjectId> = current
            .payload
            .iter()
            .map(|entry| &entry.subject_id)
            .collect();

        let removed: Vec<String> = previous
            .map(|page| {
                page.payload
                    .iter()
                    .filter(|entry| !current_ids.contains(&entry.subject_id))
                    .map(|entry| hot_key(&entry.subject_id))
                    .collect()
            })
            .unwrap_or_default();

        if !removed.is_empty() && !self.store.delete(&removed).await {
            warn!(
                owner = %owner,
                removed = removed.len(),
                "Failed to delete hot-cache keys for unfollowed subjects"
            );
        }

        for entry in &current.payload {
            let hot = HotEntry {
                status: entry.status,
                last_seen: entry.last_seen,
                connection_id: entry.connection_id.clone(),
            };
            self.store
                .put_json(&hot_key(&entry.subject_id), &hot, self.entry_ttl)
                .await;
        }

        histogram!(METRIC_HOT_SYNC_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        debug!(
            owner = %owner,
            written = current.payload.len(),
            removed = removed.len(),
            "Hot cache synchronized"
        );
    }
}
