//! Presence status records.
//!
//! Presence is computed elsewhere (the connection layer flips subjects
//! online and offline); this crate only reads the resulting rows.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::subject::SubjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    #[default]
    Offline,
    Away,
}

impl PresenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Offline => "offline",
            PresenceStatus::Away => "away",
        }
    }
}

/// A raw presence row as stored by the presence collaborator.
///
/// Read-only to this crate; subjects without a row are implicitly
/// offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub subject_id: SubjectId,
    pub status: PresenceStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub connection_id: Option<String>,
}
