//! Bulk status resolution with connection reconciliation.
//!
//! Presence rows can outlive their WebSocket connection (a crashed
//! client never writes its offline row), so bulk reads cross-check rows
//! claiming online against the connection registry and downgrade the
//! ones whose socket is gone.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;

use crate::domain::presence::{PresenceStatus, StatusRecord};
use crate::domain::profiles::ProfileSnapshot;
use crate::domain::subject::SubjectId;

use super::profiles::ProfileFetcher;
use super::sources::{ConnectionRegistry, PresenceStore};

/// One subject's resolved status, optionally with their profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkStatusEntry {
    pub status: PresenceStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    pub connection_id: Option<String>,
    pub profile: Option<ProfileSnapshot>,
}

/// Resolves sets of subjects to reconciled status entries.
pub struct BulkStatusService {
    presence: Arc<dyn PresenceStore>,
    connections: Arc<dyn ConnectionRegistry>,
    profiles: Arc<ProfileFetcher>,
}

impl BulkStatusService {
    pub fn new(
        presence: Arc<dyn PresenceStore>,
        connections: Arc<dyn ConnectionRegistry>,
        profiles: Arc<ProfileFetcher>,
    ) -> Self {
        Self {
            presence,
            connections,
            profiles,
        }
    }

    /// Resolve every requested subject. Subjects without a presence row
    /// are offline; rows claiming online without a live connection are
    /// downgraded. A presence-store failure degrades the whole batch to
    /// offline rather than failing it.
    pub async fn bulk_status(
        &self,
        ids: &[SubjectId],
        include_profile: bool,
    ) -> HashMap<SubjectId, BulkStatusEntry> {
        if ids.is_empty() {
            return HashMap::new();
        }

        let rows: HashMap<SubjectId, StatusRecord> = match self.presence.bulk_status(ids).await {
            Ok(rows) => rows
                .into_iter()
                .map(|record| (record.subject_id.clone(), record))
                .collect(),
            Err(err) => {
                warn!(
                    requested = ids.len(),
                    error = %err,
                    "Presence store unavailable; bulk status degrades to offline"
                );
                HashMap::new()
            }
        };

        let connected = self.connections.currently_connected_ids();

        let mut entries: HashMap<SubjectId, BulkStatusEntry> = ids
            .iter()
            .map(|id| {
                let entry = match rows.get(id) {
                    Some(record) => {
                        let stale_online = record.status == PresenceStatus::Online
                            && !connected.contains(id);
                        BulkStatusEntry {
                            status: if stale_online {
                                PresenceStatus::Offline
                            } else {
                                record.status
                            },
                            last_seen: Some(record.last_seen),
                            connection_id: if stale_online {
                                None
                            } else {
                                record.connection_id.clone()
                            },
                            profile: None,
                        }
                    }
                    None => BulkStatusEntry {
                        status: PresenceStatus::Offline,
                        last_seen: None,
                        connection_id: None,
                        profile: None,
                    },
                };
                (id.clone(), entry)
            })
            .collect();

        if include_profile {
            let profiles = self.profiles.fetch_many(ids).await;
            for (id, profile) in profiles {
                if let Some(entry) = entries.get_mut(&id) {
                    entry.profile = Some(profile);
                }
            }
        }

        entries
    }
}
