//! Profile snapshots served by the profile collaborator.

use serde::{Deserialize, Serialize};

use super::subject::SubjectId;

/// A wallet attached to a profile. Order matters: the first entry is the
/// subject's primary wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRef {
    pub chain: String,
    pub address: String,
}

/// Immutable snapshot of a subject's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub subject_id: SubjectId,
    pub username: String,
    pub display_name: String,
    pub avatar_reference: Option<String>,
    #[serde(default)]
    pub wallets: Vec<WalletRef>,
}
