//! Following entries and aggregated pages.
//!
//! `FollowingEntry` is what the relationship collaborator hands over per
//! followed subject; `FollowingStatusEntry` is that entry merged with the
//! subject's presence row and profile snapshot. The defaulting rules for
//! absent rows live in [`FollowingStatusEntry::merge`] and nowhere else.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::presence::{PresenceStatus, StatusRecord};
use super::profiles::{ProfileSnapshot, WalletRef};
use super::subject::SubjectId;

/// One followed subject, as supplied by the relationship collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowingEntry {
    pub subject_id: SubjectId,
    pub conversation_reference: String,
    pub in_call: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_message_at: Option<OffsetDateTime>,
}

/// A followed subject merged with presence and profile data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowingStatusEntry {
    pub subject_id: SubjectId,
    pub username: String,
    pub display_name: String,
    pub avatar_reference: Option<String>,
    #[serde(default)]
    pub wallets: Vec<WalletRef>,
    pub status: PresenceStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    pub connection_id: Option<String>,
    pub conversation_reference: String,
    pub in_call: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_message_at: Option<OffsetDateTime>,
}

impl FollowingStatusEntry {
    /// Merge a following entry with its optional presence row and profile
    /// snapshot.
    ///
    /// Absent presence means offline with no last-seen. An absent profile
    /// degrades to placeholders: the subject id stands in for the
    /// username, the display name reads "Unknown user", the avatar and
    /// wallets stay empty.
    pub fn merge(
        following: &FollowingEntry,
        status: Option<&StatusRecord>,
        profile: Option<&ProfileSnapshot>,
    ) -> Self {
        let (username, display_name, avatar_reference, wallets) = match profile {
            Some(profile) => (
                profile.username.clone(),
                profile.display_name.clone(),
                profile.avatar_reference.clone(),
                profile.wallets.clone(),
            ),
            None => (
                following.subject_id.to_string(),
                "Unknown user".to_string(),
                None,
                Vec::new(),
            ),
        };

        Self {
            subject_id: following.subject_id.clone(),
            username,
            display_name,
            avatar_reference,
            wallets,
            status: status.map(|record| record.status).unwrap_or_default(),
            last_seen: status.map(|record| record.last_seen),
            connection_id: status.and_then(|record| record.connection_id.clone()),
            conversation_reference: following.conversation_reference.clone(),
            in_call: following.in_call,
            last_message_at: following.last_message_at,
        }
    }
}

/// One cached page of merged following-status entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowingPage {
    pub owner_subject: SubjectId,
    pub page_index: u32,
    pub payload: Vec<FollowingStatusEntry>,
    pub total: usize,
    pub is_last_page: bool,
}

impl FollowingPage {
    /// An empty, terminal page for an owner with nothing on this slice.
    pub fn empty(owner_subject: SubjectId, page_index: u32, total: usize) -> Self {
        Self {
            owner_subject,
            page_index,
            payload: Vec::new(),
            total,
            is_last_page: true,
        }
    }

    /// Ids of the subjects on this page, in payload order.
    pub fn subject_ids(&self) -> Vec<SubjectId> {
        self.payload
            .iter()
            .map(|entry| entry.subject_id.clone())
            .collect()
    }
}
