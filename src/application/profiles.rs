//! Rate-limited profile fetcher.
//!
//! Turns subject ids into profile snapshots without hammering the
//! profile collaborator: a bounded number of concurrent outbound calls,
//! a per-second admission window, bounded retries with exponential
//! backoff, and a short-TTL per-id memo cache. A subject whose fetch
//! exhausts its retries degrades to absent; it never fails a batch.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use metrics::counter;
use tokio::sync::Semaphore;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::cache::lock::mutex_lock;
use crate::domain::profiles::ProfileSnapshot;
use crate::domain::subject::SubjectId;

use super::sources::ProfileSource;

const SOURCE: &str = "application::profiles";

const METRIC_PROFILE_RETRY: &str = "veglia_profile_retry_total";
const METRIC_PROFILE_DEGRADED: &str = "veglia_profile_degraded_total";
const METRIC_PROFILE_MEMO_HIT: &str = "veglia_profile_memo_hit_total";

const RATE_WINDOW: Duration = Duration::from_secs(1);

const DEFAULT_MAX_CONCURRENCY: usize = 5;
const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 15;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 500;
const DEFAULT_MEMO_TTL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Maximum concurrent outbound profile calls.
    pub max_concurrency: usize,
    /// Maximum admissions per one-second window.
    pub rate_limit_per_second: u32,
    /// Total attempts per subject before degrading to absent.
    pub retry_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt.
    pub retry_base_backoff: Duration,
    /// How long a fetched profile (or definitive absence) is memoized.
    pub memo_ttl: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_backoff: Duration::from_millis(DEFAULT_RETRY_BASE_BACKOFF_MS),
            memo_ttl: Duration::from_secs(DEFAULT_MEMO_TTL_SECS),
        }
    }
}

impl From<&crate::config::ProfileSourceSettings> for FetcherConfig {
    fn from(settings: &crate::config::ProfileSourceSettings) -> Self {
        Self {
            max_concurrency: settings.max_concurrency.get(),
            rate_limit_per_second: settings.rate_limit_per_second.get(),
            retry_attempts: settings.retry_attempts.get(),
            retry_base_backoff: settings.retry_base_backoff,
            memo_ttl: settings.memo_ttl,
        }
    }
}

struct MemoEntry {
    profile: Option<ProfileSnapshot>,
    cached_at: Instant,
}

/// Bounded, retrying, memoizing client for the profile collaborator.
pub struct ProfileFetcher {
    source: Arc<dyn ProfileSource>,
    config: FetcherConfig,
    admissions: Semaphore,
    window: Mutex<VecDeque<Instant>>,
    memo: DashMap<SubjectId, MemoEntry>,
}

impl ProfileFetcher {
    pub fn new(source: Arc<dyn ProfileSource>, config: FetcherConfig) -> Self {
        let permits = config.max_concurrency.max(1);
        Self {
            source,
            config,
            admissions: Semaphore::new(permits),
            window: Mutex::new(VecDeque::new()),
            memo: DashMap::new(),
        }
    }

    /// Fetch one profile, degrading to `None` after exhausted retries.
    pub async fn fetch_one(&self, id: &SubjectId) -> Option<ProfileSnapshot> {
        let memoized = self.memo.get(id).and_then(|entry| {
            (entry.cached_at.elapsed() < self.config.memo_ttl).then(|| entry.profile.clone())
        });
        if let Some(profile) = memoized {
            counter!(METRIC_PROFILE_MEMO_HIT).increment(1);
            return profile;
        }

        let Ok(_permit) = self.admissions.acquire().await else {
            warn!(subject = %id, "Profile admission semaphore closed");
            return None;
        };
        self.admit().await;

        let mut attempt: u32 = 1;
        loop {
            match self.source.fetch(id).await {
                Ok(profile) => {
                    self.memo.insert(
                        id.clone(),
                        MemoEntry {
                            profile: profile.clone(),
                            cached_at: Instant::now(),
                        },
                    );
                    return profile;
                }
                Err(err) if err.is_retryable() && attempt < self.config.retry_attempts => {
                    counter!(METRIC_PROFILE_RETRY).increment(1);
                    let backoff = self.config.retry_base_backoff * 2u32.pow(attempt - 1);
                    debug!(
                        subject = %id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Retrying profile fetch"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    counter!(METRIC_PROFILE_DEGRADED).increment(1);
                    warn!(
                        subject = %id,
                        attempts = attempt,
                        error = %err,
                        "Profile fetch degraded to absent"
                    );
                    return None;
                }
            }
        }
    }

    /// Fetch a batch with all-settle semantics: one subject's exhaustion
    /// never aborts the rest. Subjects that degraded are simply missing
    /// from the returned map.
    pub async fn fetch_many(&self, ids: &[SubjectId]) -> HashMap<SubjectId, ProfileSnapshot> {
        let lookups = ids
            .iter()
            .map(|id| async move { (id.clone(), self.fetch_one(id).await) });
        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(id, profile)| profile.map(|profile| (id, profile)))
            .collect()
    }

    /// Wait for a slot in the one-second admission window.
    async fn admit(&self) {
        loop {
            let wait = {
                let mut window = mutex_lock(&self.window, SOURCE, "admit");
                let now = Instant::now();
                while window
                    .front()
                    .is_some_and(|admitted| now.duration_since(*admitted) >= RATE_WINDOW)
                {
                    window.pop_front();
                }
                if (window.len() as u32) < self.config.rate_limit_per_second.max(1) {
                    window.push_back(now);
                    None
                } else {
                    window
                        .front()
                        .map(|oldest| (*oldest + RATE_WINDOW).saturating_duration_since(now))
                }
            };
            match wait {
                None => return,
                Some(delay) => sleep(delay.max(Duration::from_millis(1))).await,
            }
        }
    }
}
