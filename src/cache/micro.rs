//! Process-local micro cache.
//!
//! A small LRU in front of the shared KV store that absorbs repeat reads
//! for the same page within a short window. Entries expire by age on
//! read; the clock is tokio's so tests can drive expiry under paused
//! time.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use crate::domain::following::FollowingPage;
use crate::domain::subject::SubjectId;

use super::config::CacheConfig;
use super::keys::PageKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::micro";

struct MicroEntry {
    page: Arc<FollowingPage>,
    inserted_at: Instant,
}

/// LRU of recently served pages with a short per-entry TTL.
pub struct MicroCache {
    entries: RwLock<LruCache<PageKey, MicroEntry>>,
    entry_ttl: Duration,
}

impl MicroCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.micro_capacity_non_zero())),
            entry_ttl: config.micro_ttl,
        }
    }

    pub fn get(&self, key: &PageKey) -> Option<Arc<FollowingPage>> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let live = entries.get(key).map(|entry| {
            (entry.inserted_at.elapsed() < self.entry_ttl).then(|| Arc::clone(&entry.page))
        });
        match live {
            Some(Some(page)) => Some(page),
            Some(None) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: PageKey, page: Arc<FollowingPage>) {
        let entry = MicroEntry {
            page,
            inserted_at: Instant::now(),
        };
        rw_write(&self.entries, SOURCE, "insert").put(key, entry);
    }

    /// Drop every cached page belonging to `owner`.
    pub fn purge_owner(&self, owner: &SubjectId) {
        let mut entries = rw_write(&self.entries, SOURCE, "purge_owner");
        let owned: Vec<PageKey> = entries
            .iter()
            .filter(|(key, _)| &key.owner == owner)
            .map(|(key, _)| key.clone())
            .collect();
        for key in owned {
            entries.pop(&key);
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(raw: &str) -> SubjectId {
        SubjectId::parse(raw).expect("id parses")
    }

    fn page(owner: &str, index: u32) -> Arc<FollowingPage> {
        Arc::new(FollowingPage::empty(subject(owner), index, 0))
    }

    fn micro(capacity: usize) -> MicroCache {
        MicroCache::new(&CacheConfig {
            micro_capacity: capacity,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = micro(8);
        let key = PageKey::new(subject("u1"), 0);
        cache.insert(key.clone(), page("u1", 0));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cache.get(&key).is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_least_recently_used() {
        let cache = micro(2);
        let first = PageKey::new(subject("u1"), 0);
        let second = PageKey::new(subject("u2"), 0);
        let third = PageKey::new(subject("u3"), 0);

        cache.insert(first.clone(), page("u1", 0));
        cache.insert(second.clone(), page("u2", 0));
        cache.insert(third.clone(), page("u3", 0));

        assert!(cache.get(&first).is_none());
        assert!(cache.get(&second).is_some());
        assert!(cache.get(&third).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_owner_drops_only_their_pages() {
        let cache = micro(8);
        cache.insert(PageKey::new(subject("u1"), 0), page("u1", 0));
        cache.insert(PageKey::new(subject("u1"), 1), page("u1", 1));
        cache.insert(PageKey::new(subject("u2"), 0), page("u2", 0));

        cache.purge_owner(&subject("u1"));

        assert!(cache.get(&PageKey::new(subject("u1"), 0)).is_none());
        assert!(cache.get(&PageKey::new(subject("u1"), 1)).is_none());
        assert!(cache.get(&PageKey::new(subject("u2"), 0)).is_some());
    }
}
