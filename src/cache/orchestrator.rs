//! Stale-while-revalidate read path.
//!
//! The orchestrator decides, per read, between the micro cache, a fresh
//! KV hit, a stale serve with one background refresh, and a full miss.
//! On a miss it elects one fetcher through an atomic lock key; losers
//! poll briefly for the winner's result and then fetch anyway rather
//! than hang. Within the process the flight registry keeps aggregation
//! single-flight per (owner, page); across processes the lock only
//! discourages duplicates, which the aggregator's idempotence tolerates.
//!
//! Background refreshes run as tracked tasks in a bounded set, so their
//! errors are logged deterministically and shutdown or tests can drain
//! outstanding work instead of leaking it.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::application::aggregator::{AggregateError, FollowingAggregator};
use crate::domain::following::FollowingPage;
use crate::domain::subject::SubjectId;

use super::config::CacheConfig;
use super::flight::{FlightError, FlightFuture, FlightRegistry};
use super::freshness::Freshness;
use super::hot::HotCacheSynchronizer;
use super::keys::PageKey;
use super::micro::MicroCache;
use super::store::CacheStore;

const METRIC_PAGE_MICRO_HIT: &str = "veglia_page_micro_hit_total";
const METRIC_PAGE_KV_HIT: &str = "veglia_page_kv_hit_total";
const METRIC_PAGE_STALE_SERVE: &str = "veglia_page_stale_serve_total";
const METRIC_PAGE_MISS: &str = "veglia_page_miss_total";
const METRIC_PAGE_REFRESH: &str = "veglia_page_refresh_total";
const METRIC_PAGE_LOCK_CONTENDED: &str = "veglia_page_lock_contended_total";

/// The page cache read path. One instance per process, injected into
/// callers; all mutable state lives in fields, never in globals.
pub struct PageCache {
    config: CacheConfig,
    store: CacheStore,
    micro: Arc<MicroCache>,
    flights: FlightRegistry<PageKey, Arc<FollowingPage>, AggregateError>,
    aggregator: Arc<FollowingAggregator>,
    hot: Arc<HotCacheSynchronizer>,
    refreshes: Mutex<JoinSet<()>>,
}

impl PageCache {
    pub fn new(
        config: CacheConfig,
        store: CacheStore,
        aggregator: Arc<FollowingAggregator>,
        hot: Arc<HotCacheSynchronizer>,
    ) -> Self {
        let micro = Arc::new(MicroCache::new(&config));
        Self {
            config,
            store,
            micro,
            flights: FlightRegistry::new(),
            aggregator,
            hot,
            refreshes: Mutex::new(JoinSet::new()),
        }
    }

    /// Resolve one page, serving cached data whenever the windows allow.
    #[instrument(skip_all, fields(owner = %owner, page))]
    pub async fn get(
        &self,
        owner: &SubjectId,
        page: u32,
        limit: u32,
    ) -> Result<Arc<FollowingPage>, AggregateError> {
        let key = PageKey::new(owner.clone(), page);

        if let Some(cached) = self.micro.get(&key) {
            counter!(METRIC_PAGE_MICRO_HIT).increment(1);
            return Ok(cached);
        }

        if let Some((cached, remaining)) = self
            .store
            .get_json::<FollowingPage>(&key.storage_key())
            .await
        {
            let cached = Arc::new(cached);
            match Freshness::classify(remaining, self.config.grace_window) {
                Freshness::Fresh => {
                    counter!(METRIC_PAGE_KV_HIT).increment(1);
                    self.micro.insert(key, Arc::clone(&cached));
                    return Ok(cached);
                }
                Freshness::Stale => {
                    counter!(METRIC_PAGE_STALE_SERVE).increment(1);
                    self.schedule_refresh(key, limit).await;
                    return Ok(cached);
                }
                Freshness::Miss => {}
            }
        }

        counter!(METRIC_PAGE_MISS).increment(1);

        let lock_key = key.lock_key();
        if self.store.acquire_lock(&lock_key, self.config.lock_ttl).await {
            let result = self.join_fetch(key, limit).await;
            self.store.release(&lock_key).await;
            return result;
        }

        // Another holder owns the fetch; wait briefly for its result.
        counter!(METRIC_PAGE_LOCK_CONTENDED).increment(1);
        let deadline = Instant::now() + self.config.lock_wait_budget;
        loop {
            sleep(self.config.lock_poll_interval).await;
            if let Some((cached, _)) = self
                .store
                .get_json::<FollowingPage>(&key.storage_key())
                .await
            {
                let cached = Arc::new(cached);
                self.micro.insert(key, Arc::clone(&cached));
                return Ok(cached);
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        // The holder never published. Fetch anyway: a duplicate build is
        // a wasted read, not a correctness problem.
        debug!(
            key = %key.storage_key(),
            "Lock wait budget exhausted; fetching independently"
        );
        self.join_fetch(key, limit).await
    }

    /// Delete every tracked page for `owner`, in the KV store and the
    /// micro cache, so the next read provably re-aggregates.
    pub async fn invalidate(&self, owner: &SubjectId) {
        let keys: Vec<String> = (0..self.config.max_tracked_pages)
            .map(|page| PageKey::new(owner.clone(), page).storage_key())
            .collect();
        self.store.delete(&keys).await;
        self.micro.purge_owner(owner);
        debug!(owner = %owner, pages = keys.len(), "Invalidated cached pages");
    }

    /// Fire-and-forget page-0 population for a batch of owners. Owners
    /// whose page 0 is still fresh are skipped.
    pub async fn prewarm(&self, owners: Vec<SubjectId>) {
        for owner in owners {
            let key = PageKey::new(owner, 0);
            if let Some((_, remaining)) = self
                .store
                .get_json::<FollowingPage>(&key.storage_key())
                .await
                && Freshness::classify(remaining, self.config.grace_window) == Freshness::Fresh
            {
                continue;
            }
            self.schedule_refresh(key, self.config.default_page_limit).await;
        }
    }

    /// Await every outstanding background refresh. Shutdown and test
    /// hook; readers never call this.
    pub async fn drain_refreshes(&self) {
        let mut refreshes = self.refreshes.lock().await;
        while let Some(joined) = refreshes.join_next().await {
            if let Err(err) = joined
                && err.is_panic()
            {
                warn!("Background refresh task panicked");
            }
        }
    }

    /// Join the single in-flight build for `key`, starting it if idle,
    /// and publish the result to the micro cache.
    async fn join_fetch(
        &self,
        key: PageKey,
        limit: u32,
    ) -> Result<Arc<FollowingPage>, AggregateError> {
        let flight = self.begin_flight(&key, limit);
        match flight.await {
            Ok(built) => {
                self.micro.insert(key, Arc::clone(&built));
                Ok(built)
            }
            Err(FlightError::Task(err)) => Err(err),
            Err(interrupted) => Err(AggregateError::Interrupted {
                message: interrupted.to_string(),
            }),
        }
    }

    /// Register (or join) the aggregation flight for `key`. The flight
    /// builds the page, writes it back with the full fresh-plus-grace
    /// TTL, and reconciles the hot cache on page 0.
    fn begin_flight(
        &self,
        key: &PageKey,
        limit: u32,
    ) -> FlightFuture<Arc<FollowingPage>, AggregateError> {
        let aggregator = Arc::clone(&self.aggregator);
        let store = self.store.clone();
        let hot = Arc::clone(&self.hot);
        let total_ttl = self.config.total_ttl();
        let flight_key = key.clone();

        self.flights.run_exclusive(key.clone(), move || async move {
            let storage_key = flight_key.storage_key();
            let previous = if flight_key.page == 0 {
                store
                    .get_json::<FollowingPage>(&storage_key)
                    .await
                    .map(|(page, _)| page)
            } else {
                None
            };

            let built = aggregator
                .build(&flight_key.owner, flight_key.page, limit)
                .await?;
            let built = Arc::new(built);

            store.put_json(&storage_key, built.as_ref(), total_ttl).await;

            if flight_key.page == 0 {
                hot.sync(&flight_key.owner, previous.as_ref(), built.as_ref())
                    .await;
            }

            Ok(built)
        })
    }

    /// Start one tracked background refresh for `key` unless a flight is
    /// already running. Errors are logged and swallowed; a stale reader
    /// never sees them.
    async fn schedule_refresh(&self, key: PageKey, limit: u32) {
        if self.flights.contains(&key) {
            return;
        }

        let mut refreshes = self.refreshes.lock().await;
        while refreshes.try_join_next().is_some() {}
        if refreshes.len() >= self.config.max_background_refreshes {
            warn!(
                key = %key.storage_key(),
                "Background refresh skipped: tracked set is full"
            );
            return;
        }

        let refresh_id = Uuid::new_v4();
        let flight = self.begin_flight(&key, limit);
        let micro = Arc::clone(&self.micro);
        refreshes.spawn(async move {
            match flight.await {
                Ok(built) => {
                    micro.insert(key, built);
                    counter!(METRIC_PAGE_REFRESH).increment(1);
                    debug!(refresh_id = %refresh_id, "Background refresh completed");
                }
                Err(err) => {
                    warn!(
                        refresh_id = %refresh_id,
                        error = %err,
                        "Background refresh failed"
                    );
                }
            }
        });
    }
}
