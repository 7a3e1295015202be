//! Cache configuration.
//!
//! Controls the page cache windows, the stampede lock, and the hot cache
//! via `veglia.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

// Default values for cache configuration
const DEFAULT_FRESH_WINDOW_SECS: u64 = 240;
const DEFAULT_GRACE_WINDOW_SECS: u64 = 60;
const DEFAULT_LOCK_TTL_SECS: u64 = 2;
const DEFAULT_LOCK_POLL_MS: u64 = 100;
const DEFAULT_LOCK_WAIT_BUDGET_MS: u64 = 3000;
const DEFAULT_MICRO_TTL_SECS: u64 = 30;
const DEFAULT_MICRO_CAPACITY: usize = 1024;
const DEFAULT_HOT_TTL_SECS: u64 = 3600;
const DEFAULT_MAX_TRACKED_PAGES: u32 = 32;
const DEFAULT_PAGE_LIMIT: u32 = 20;
const DEFAULT_MAX_PAGE_LIMIT: u32 = 100;
const DEFAULT_MAX_BACKGROUND_REFRESHES: usize = 32;

/// Cache configuration for one [`PageCache`](super::PageCache) instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a written page counts as fully fresh.
    pub fresh_window: Duration,
    /// How long past the fresh window a page is still served while a
    /// refresh runs in the background.
    pub grace_window: Duration,
    /// Expiry on the fetch-election lock key.
    pub lock_ttl: Duration,
    /// Interval between KV polls while another holder owns the lock.
    pub lock_poll_interval: Duration,
    /// Total time a contended reader polls before fetching anyway.
    pub lock_wait_budget: Duration,
    /// Entry TTL in the process-local micro cache.
    pub micro_ttl: Duration,
    /// Capacity of the process-local micro cache.
    pub micro_capacity: usize,
    /// TTL on per-subject hot-cache keys.
    pub hot_ttl: Duration,
    /// How many page indices `invalidate` deletes per owner.
    pub max_tracked_pages: u32,
    /// Page size used by prewarm and by callers that pass none.
    pub default_page_limit: u32,
    /// Upper bound on caller-supplied page sizes.
    pub max_page_limit: u32,
    /// Upper bound on concurrently tracked background refreshes.
    pub max_background_refreshes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_window: Duration::from_secs(DEFAULT_FRESH_WINDOW_SECS),
            grace_window: Duration::from_secs(DEFAULT_GRACE_WINDOW_SECS),
            lock_ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECS),
            lock_poll_interval: Duration::from_millis(DEFAULT_LOCK_POLL_MS),
            lock_wait_budget: Duration::from_millis(DEFAULT_LOCK_WAIT_BUDGET_MS),
            micro_ttl: Duration::from_secs(DEFAULT_MICRO_TTL_SECS),
            micro_capacity: DEFAULT_MICRO_CAPACITY,
            hot_ttl: Duration::from_secs(DEFAULT_HOT_TTL_SECS),
            max_tracked_pages: DEFAULT_MAX_TRACKED_PAGES,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
            max_background_refreshes: DEFAULT_MAX_BACKGROUND_REFRESHES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            fresh_window: settings.fresh_window,
            grace_window: settings.grace_window,
            lock_ttl: settings.lock_ttl,
            lock_poll_interval: settings.lock_poll_interval,
            lock_wait_budget: settings.lock_wait_budget,
            micro_ttl: settings.micro_ttl,
            micro_capacity: settings.micro_capacity.get(),
            hot_ttl: settings.hot_ttl,
            max_tracked_pages: settings.max_tracked_pages,
            default_page_limit: settings.default_page_limit.get(),
            max_page_limit: settings.max_page_limit.get(),
            max_background_refreshes: settings.max_background_refreshes.get(),
        }
    }
}

impl CacheConfig {
    /// Combined TTL written on every page: pages are never written with
    /// less than the full fresh plus grace window.
    pub fn total_ttl(&self) -> Duration {
        self.fresh_window + self.grace_window
    }

    /// Returns the micro-cache capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn micro_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.micro_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
