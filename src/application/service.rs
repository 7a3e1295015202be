//! Service facade.
//!
//! `FollowingStatusService` is the one object embedders construct per
//! process. It owns the page cache, the bulk status service, and the
//! profile fetcher, and is the boundary where raw caller input is
//! validated before anything is fetched.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::{CacheConfig, CacheStore, HotCacheSynchronizer, PageCache};
use crate::config::Settings;
use crate::domain::error::DomainError;
use crate::domain::following::FollowingPage;
use crate::domain::subject::SubjectId;
use crate::infra::kv::KvBackend;

use super::aggregator::{AggregateError, FollowingAggregator};
use super::profiles::{FetcherConfig, ProfileFetcher};
use super::sources::{ConnectionRegistry, PresenceStore, ProfileSource, RelationshipSource};
use super::status::{BulkStatusEntry, BulkStatusService};

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("relationship source requires authentication")]
    Unauthenticated,
    #[error("aggregation failed: {message}")]
    Aggregation { message: String },
}

impl From<AggregateError> for ServiceError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::Unauthenticated => ServiceError::Unauthenticated,
            other => ServiceError::Aggregation {
                message: other.to_string(),
            },
        }
    }
}

/// The exposed operations of the cache core.
pub struct FollowingStatusService {
    pages: PageCache,
    bulk: BulkStatusService,
    max_page_limit: u32,
    default_page_limit: u32,
}

impl FollowingStatusService {
    /// Wire the service from explicit configs and injected collaborators.
    pub fn new(
        cache_config: CacheConfig,
        fetcher_config: FetcherConfig,
        backend: Arc<dyn KvBackend>,
        relationships: Arc<dyn RelationshipSource>,
        presence: Arc<dyn PresenceStore>,
        profile_source: Arc<dyn ProfileSource>,
        connections: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        let store = CacheStore::new(backend);
        let profiles = Arc::new(ProfileFetcher::new(profile_source, fetcher_config));
        let aggregator = Arc::new(FollowingAggregator::new(
            relationships,
            Arc::clone(&presence),
            Arc::clone(&profiles),
        ));
        let hot = Arc::new(HotCacheSynchronizer::new(
            store.clone(),
            cache_config.hot_ttl,
        ));
        let max_page_limit = cache_config.max_page_limit;
        let default_page_limit = cache_config.default_page_limit;
        let pages = PageCache::new(cache_config, store, aggregator, hot);
        let bulk = BulkStatusService::new(presence, connections, profiles);

        Self {
            pages,
            bulk,
            max_page_limit,
            default_page_limit,
        }
    }

    /// Wire the service from loaded settings.
    pub fn from_settings(
        settings: &Settings,
        backend: Arc<dyn KvBackend>,
        relationships: Arc<dyn RelationshipSource>,
        presence: Arc<dyn PresenceStore>,
        profile_source: Arc<dyn ProfileSource>,
        connections: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        Self::new(
            CacheConfig::from(&settings.cache),
            FetcherConfig::from(&settings.profile_source),
            backend,
            relationships,
            presence,
            profile_source,
            connections,
        )
    }

    /// Resolve one page of the owner's following-status view.
    pub async fn get_following_status(
        &self,
        owner: &str,
        page: u32,
        limit: u32,
    ) -> Result<Arc<FollowingPage>, ServiceError> {
        let owner = SubjectId::parse(owner)?;
        let limit = self.validate_limit(limit)?;
        self.pages
            .get(&owner, page, limit)
            .await
            .map_err(ServiceError::from)
    }

    /// Resolve reconciled status entries for a set of subjects.
    pub async fn get_bulk_status(
        &self,
        ids: &[String],
        include_profile: bool,
    ) -> Result<HashMap<SubjectId, BulkStatusEntry>, ServiceError> {
        let ids = ids
            .iter()
            .map(|raw| SubjectId::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.bulk.bulk_status(&ids, include_profile).await)
    }

    /// Delete every cached page for an owner. The next read is
    /// guaranteed to re-aggregate, even issued immediately after.
    pub async fn invalidate(&self, owner: &str) -> Result<(), ServiceError> {
        let owner = SubjectId::parse(owner)?;
        self.pages.invalidate(&owner).await;
        Ok(())
    }

    /// Fire-and-forget page-0 population for the given owners.
    pub async fn prewarm(&self, owners: &[String]) -> Result<(), ServiceError> {
        let owners = owners
            .iter()
            .map(|raw| SubjectId::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        self.pages.prewarm(owners).await;
        Ok(())
    }

    /// Await outstanding background refreshes; shutdown and test hook.
    pub async fn drain_background(&self) {
        self.pages.drain_refreshes().await;
    }

    /// The page size prewarm and defaulting callers use.
    pub fn default_page_limit(&self) -> u32 {
        self.default_page_limit
    }

    fn validate_limit(&self, limit: u32) -> Result<u32, ServiceError> {
        if limit == 0 {
            return Err(DomainError::validation("page limit must be greater than zero").into());
        }
        if limit > self.max_page_limit {
            return Err(DomainError::validation(format!(
                "page limit {limit} exceeds maximum {}",
                self.max_page_limit
            ))
            .into());
        }
        Ok(limit)
    }
}
