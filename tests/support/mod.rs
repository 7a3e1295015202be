//! Scripted collaborator doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use veglia::application::profiles::FetcherConfig;
use veglia::application::sources::{
    ConnectionRegistry, PresenceStore, ProfileSource, RelationshipSource, SourceError,
};
use veglia::cache::CacheConfig;
use veglia::domain::following::FollowingEntry;
use veglia::infra::kv::{InMemoryKvBackend, KvBackend, KvError};
use veglia::{FollowingStatusService, PresenceStatus, ProfileSnapshot, StatusRecord, SubjectId};

pub fn subject(raw: &str) -> SubjectId {
    SubjectId::parse(raw).expect("test subject id parses")
}

pub fn following_entry(raw: &str) -> FollowingEntry {
    FollowingEntry {
        subject_id: subject(raw),
        conversation_reference: format!("conv-{raw}"),
        in_call: false,
        last_message_at: None,
    }
}

fn fixed_last_seen() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
}

/// Relationship source with a mutable following list and a call counter.
pub struct ScriptedRelationships {
    following: RwLock<Vec<FollowingEntry>>,
    calls: AtomicUsize,
    unauthenticated: AtomicBool,
}

impl ScriptedRelationships {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            following: RwLock::new(ids.iter().map(|raw| following_entry(raw)).collect()),
            calls: AtomicUsize::new(0),
            unauthenticated: AtomicBool::new(false),
        }
    }

    pub fn set_following(&self, ids: &[&str]) {
        *self.following.write().expect("following lock") =
            ids.iter().map(|raw| following_entry(raw)).collect();
    }

    pub fn set_unauthenticated(&self, value: bool) {
        self.unauthenticated.store(value, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelationshipSource for ScriptedRelationships {
    async fn following(&self, _owner: &SubjectId) -> Result<Vec<FollowingEntry>, SourceError> {
        if self.unauthenticated.load(Ordering::SeqCst) {
            return Err(SourceError::Unauthenticated);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.following.read().expect("following lock").clone())
    }
}

/// Presence store returning online rows for a mutable set of subjects.
pub struct ScriptedPresence {
    online: RwLock<HashSet<SubjectId>>,
    calls: AtomicUsize,
}

impl ScriptedPresence {
    pub fn new(online: &[&str]) -> Self {
        Self {
            online: RwLock::new(online.iter().map(|raw| subject(raw)).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_online(&self, ids: &[&str]) {
        *self.online.write().expect("online lock") =
            ids.iter().map(|raw| subject(raw)).collect();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresenceStore for ScriptedPresence {
    async fn bulk_status(&self, ids: &[SubjectId]) -> Result<Vec<StatusRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let online = self.online.read().expect("online lock");
        Ok(ids
            .iter()
            .filter(|id| online.contains(*id))
            .map(|id| StatusRecord {
                subject_id: id.clone(),
                status: PresenceStatus::Online,
                last_seen: fixed_last_seen(),
                connection_id: Some(format!("conn-{id}")),
            })
            .collect())
    }
}

/// Profile source that resolves every subject unless scripted to fail.
pub struct ScriptedProfiles {
    failing: RwLock<HashSet<SubjectId>>,
    calls: Mutex<HashMap<SubjectId, usize>>,
}

impl ScriptedProfiles {
    pub fn new() -> Self {
        Self {
            failing: RwLock::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_for(&self, ids: &[&str]) {
        *self.failing.write().expect("failing lock") =
            ids.iter().map(|raw| subject(raw)).collect();
    }

    pub fn calls_for(&self, raw: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(&subject(raw))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls lock").values().sum()
    }
}

#[async_trait]
impl ProfileSource for ScriptedProfiles {
    async fn fetch(&self, id: &SubjectId) -> Result<Option<ProfileSnapshot>, SourceError> {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(id.clone())
            .or_insert(0) += 1;

        if self.failing.read().expect("failing lock").contains(id) {
            return Err(SourceError::timeout("scripted profile timeout"));
        }

        Ok(Some(ProfileSnapshot {
            subject_id: id.clone(),
            username: format!("user-{id}"),
            display_name: format!("User {id}"),
            avatar_reference: Some(format!("avatars/{id}")),
            wallets: Vec::new(),
        }))
    }
}

/// Connection registry backed by a mutable set of connected subjects.
pub struct ScriptedConnections {
    connected: RwLock<HashSet<SubjectId>>,
}

impl ScriptedConnections {
    pub fn new(connected: &[&str]) -> Self {
        Self {
            connected: RwLock::new(connected.iter().map(|raw| subject(raw)).collect()),
        }
    }

    pub fn set_connected(&self, ids: &[&str]) {
        *self.connected.write().expect("connected lock") =
            ids.iter().map(|raw| subject(raw)).collect();
    }
}

impl ConnectionRegistry for ScriptedConnections {
    fn currently_connected_ids(&self) -> HashSet<SubjectId> {
        self.connected.read().expect("connected lock").clone()
    }
}

/// KV backend that can be flipped offline to exercise soft-fail paths.
pub struct FlakyKv {
    inner: InMemoryKvBackend,
    down: AtomicBool,
}

impl FlakyKv {
    pub fn new() -> Self {
        Self {
            inner: InMemoryKvBackend::new(),
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, value: bool) {
        self.down.store(value, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), KvError> {
        if self.down.load(Ordering::SeqCst) {
            Err(KvError::new("kv offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvBackend for FlakyKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        self.check()?;
        self.inner.set_ex(key, value, ttl).await
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        self.check()?;
        self.inner.set_nx_ex(key, value, ttl).await
    }

    async fn del(&self, keys: &[String]) -> Result<u64, KvError> {
        self.check()?;
        self.inner.del(keys).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        self.check()?;
        self.inner.ttl(key).await
    }
}

/// Fully wired service over scripted collaborators and an in-memory KV.
pub struct TestHarness {
    pub service: FollowingStatusService,
    pub backend: Arc<InMemoryKvBackend>,
    pub relationships: Arc<ScriptedRelationships>,
    pub presence: Arc<ScriptedPresence>,
    pub profiles: Arc<ScriptedProfiles>,
    pub connections: Arc<ScriptedConnections>,
}

pub fn harness(following: &[&str]) -> TestHarness {
    harness_with(CacheConfig::default(), FetcherConfig::default(), following)
}

pub fn harness_with(
    cache_config: CacheConfig,
    fetcher_config: FetcherConfig,
    following: &[&str],
) -> TestHarness {
    let backend = Arc::new(InMemoryKvBackend::new());
    let relationships = Arc::new(ScriptedRelationships::new(following));
    let presence = Arc::new(ScriptedPresence::new(&[]));
    let profiles = Arc::new(ScriptedProfiles::new());
    let connections = Arc::new(ScriptedConnections::new(&[]));

    let service = FollowingStatusService::new(
        cache_config,
        fetcher_config,
        backend.clone(),
        relationships.clone(),
        presence.clone(),
        profiles.clone(),
        connections.clone(),
    );

    TestHarness {
        service,
        backend,
        relationships,
        presence,
        profiles,
        connections,
    }
}
