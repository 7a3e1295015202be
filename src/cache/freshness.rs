//! Freshness classification for cached pages.
//!
//! Freshness is derived from the backend's remaining TTL at read time,
//! never stored alongside the value: pages are written with
//! fresh + grace seconds of TTL, so a remaining TTL above the grace
//! window means the page is still inside its fresh window.

use std::time::Duration;

/// How a cached page read classifies at this instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Inside the fresh window: serve without refreshing.
    Fresh,
    /// Inside the grace window: serve immediately, refresh in the
    /// background.
    Stale,
    /// Nothing usable cached.
    Miss,
}

impl Freshness {
    /// Classify a present value by its remaining TTL.
    ///
    /// `None` means the TTL probe failed or reported no expiry; that is
    /// classified stale so the value is still served but a refresh is
    /// scheduled rather than trusting an unknowable window.
    pub fn classify(remaining: Option<Duration>, grace_window: Duration) -> Self {
        match remaining {
            Some(remaining) if remaining > grace_window => Freshness::Fresh,
            Some(remaining) if remaining > Duration::ZERO => Freshness::Stale,
            Some(_) => Freshness::Miss,
            None => Freshness::Stale,
        }
    }
}
