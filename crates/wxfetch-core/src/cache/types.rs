//! Types stored in and read from the window cache.

use chrono::{DateTime, Utc};

use crate::window::TimeWindow;

/// A cached window: the upstream payload plus fetch metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub station_id: String,
    pub window: TimeWindow,
    /// Raw upstream document for this window.
    pub payload: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
    /// HTTP status of the fetch that produced the payload.
    pub upstream_status: u32,
}

impl CacheEntry {
    /// Age of the entry relative to `now`. Zero if the clock went backwards.
    pub fn age(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.fetched_at).to_std().unwrap_or_default()
    }
}

/// Summary row used by the CLI `cache` listing (payload size, not payload).
#[derive(Debug, Clone)]
pub struct CachedWindowSummary {
    pub window: TimeWindow,
    pub fetched_at: DateTime<Utc>,
    pub upstream_status: u32,
    pub payload_bytes: usize,
}
