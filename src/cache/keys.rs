//! Cache key derivation.
//!
//! All keys written to the shared KV store are derived here so the
//! layout stays in one place: `following:{owner}:page:{n}` for cached
//! pages, the same with a `:lock` suffix for the fetch-election lock,
//! and `hot:{subject}` for per-subject fast lookups.

use crate::domain::subject::SubjectId;

/// Identifies one cached page: the owner plus the page index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub owner: SubjectId,
    pub page: u32,
}

impl PageKey {
    pub fn new(owner: SubjectId, page: u32) -> Self {
        Self { owner, page }
    }

    /// Key the page payload is stored under.
    pub fn storage_key(&self) -> String {
        format!("following:{}:page:{}", self.owner, self.page)
    }

    /// Key of the fetch-election lock for this page.
    pub fn lock_key(&self) -> String {
        format!("{}:lock", self.storage_key())
    }
}

/// Hot-cache key for one subject's fast status lookup.
pub fn hot_key(subject: &SubjectId) -> String {
    format!("hot:{subject}")
}
