//! Page aggregation.
//!
//! Composes one following-status page from the collaborators: the
//! owner's full following list, sliced to the requested page, joined
//! with bulk presence rows and bulk profiles. The aggregation is a pure
//! read: duplicate concurrent builds are wasteful but harmless, which is
//! what lets the cache layer trade strict exclusivity for availability.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::histogram;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{instrument, warn};

use crate::domain::following::{FollowingPage, FollowingStatusEntry};
use crate::domain::presence::StatusRecord;
use crate::domain::subject::SubjectId;

use super::profiles::ProfileFetcher;
use super::sources::{PresenceStore, RelationshipSource, SourceError};

const METRIC_AGGREGATE_BUILD_MS: &str = "veglia_aggregate_build_ms";

/// Failure of a page build. Only the outer relationship lookup can fail
/// a build; presence and profile trouble degrades per entry instead.
#[derive(Debug, Clone, Error)]
pub enum AggregateError {
    #[error("relationship source requires authentication")]
    Unauthenticated,
    #[error("relationship lookup failed: {message}")]
    Relationship { message: String },
    #[error("page build interrupted: {message}")]
    Interrupted { message: String },
}

impl From<SourceError> for AggregateError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unauthenticated => AggregateError::Unauthenticated,
            other => AggregateError::Relationship {
                message: other.to_string(),
            },
        }
    }
}

/// Builds following-status pages from the upstream collaborators.
pub struct FollowingAggregator {
    relationships: Arc<dyn RelationshipSource>,
    presence: Arc<dyn PresenceStore>,
    profiles: Arc<ProfileFetcher>,
}

impl FollowingAggregator {
    pub fn new(
        relationships: Arc<dyn RelationshipSource>,
        presence: Arc<dyn PresenceStore>,
        profiles: Arc<ProfileFetcher>,
    ) -> Self {
        Self {
            relationships,
            presence,
            profiles,
        }
    }

    /// Build one page of the owner's following-status view.
    ///
    /// An empty following list short-circuits to an empty terminal page
    /// without touching the presence store or the profile fetcher.
    #[instrument(skip_all, fields(owner = %owner, page))]
    pub async fn build(
        &self,
        owner: &SubjectId,
        page: u32,
        limit: u32,
    ) -> Result<FollowingPage, AggregateError> {
        let started_at = Instant::now();

        let following = self.relationships.following(owner).await?;
        let total = following.len();
        if following.is_empty() {
            return Ok(FollowingPage::empty(owner.clone(), page, 0));
        }

        let start = (page as usize).saturating_mul(limit as usize);
        let slice: Vec<_> = following
            .get(start..)
            .unwrap_or_default()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect();

        if slice.is_empty() {
            // Past the end of the list: terminal page with the real total.
            return Ok(FollowingPage {
                owner_subject: owner.clone(),
                page_index: page,
                payload: Vec::new(),
                total,
                is_last_page: true,
            });
        }

        let ids: Vec<SubjectId> = slice.iter().map(|entry| entry.subject_id.clone()).collect();

        let statuses: HashMap<SubjectId, StatusRecord> =
            match self.presence.bulk_status(&ids).await {
                Ok(rows) => rows
                    .into_iter()
                    .map(|record| (record.subject_id.clone(), record))
                    .collect(),
                Err(err) => {
                    warn!(
                        owner = %owner,
                        error = %err,
                        "Presence store unavailable; page degrades to offline"
                    );
                    HashMap::new()
                }
            };

        let profiles = self.profiles.fetch_many(&ids).await;

        let payload: Vec<FollowingStatusEntry> = slice
            .iter()
            .map(|entry| {
                FollowingStatusEntry::merge(
                    entry,
                    statuses.get(&entry.subject_id),
                    profiles.get(&entry.subject_id),
                )
            })
            .collect();

        let is_last_page = start + payload.len() >= total;
        let built = FollowingPage {
            owner_subject: owner.clone(),
            page_index: page,
            payload,
            total,
            is_last_page,
        };

        histogram!(METRIC_AGGREGATE_BUILD_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        Ok(built)
    }
}
