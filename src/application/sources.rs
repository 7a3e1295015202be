//! Collaborator traits describing the upstream data sources.
//!
//! Everything this crate reads lives behind one of these seams: the
//! relationship service (who the owner follows), the presence store (raw
//! status rows), the profile service (public profiles over the network),
//! and the WebSocket layer's connection registry. Implementations are
//! injected as `Arc<dyn …>` so tests can substitute scripted doubles.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::following::FollowingEntry;
use crate::domain::presence::StatusRecord;
use crate::domain::profiles::ProfileSnapshot;
use crate::domain::subject::SubjectId;

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("upstream timeout: {message}")]
    Timeout { message: String },
    #[error("upstream unavailable: {message}")]
    Unavailable { message: String },
    #[error("upstream returned an invalid response: {message}")]
    InvalidResponse { message: String },
    #[error("authentication required")]
    Unauthenticated,
}

impl SourceError {
    pub fn timeout(message: impl std::fmt::Display) -> Self {
        Self::Timeout {
            message: message.to_string(),
        }
    }

    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    pub fn invalid_response(message: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            message: message.to_string(),
        }
    }

    /// Whether a retry can reasonably change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }
}

/// The relationship service: who an owner follows, in order, unpaginated.
#[async_trait]
pub trait RelationshipSource: Send + Sync {
    async fn following(&self, owner: &SubjectId) -> Result<Vec<FollowingEntry>, SourceError>;
}

/// The store holding raw presence rows. Subjects without a row are
/// implicitly offline.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn bulk_status(&self, ids: &[SubjectId]) -> Result<Vec<StatusRecord>, SourceError>;
}

/// The profile service, one subject per network call. `Ok(None)` is a
/// definitive "no such profile"; errors may be retried.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch(&self, id: &SubjectId) -> Result<Option<ProfileSnapshot>, SourceError>;
}

/// Live connection ids from the WebSocket layer, used to override
/// presence rows that still claim online after the socket went away.
pub trait ConnectionRegistry: Send + Sync {
    fn currently_connected_ids(&self) -> HashSet<SubjectId>;
}
