//! Per-(station, window) fetch locks.
//!
//! At most one upstream call may be outstanding for a given (station,
//! window) across the whole process, even when two jobs reference the same
//! window. Each key gets its own lock so unrelated stations and windows
//! never serialize on each other.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::window::TimeWindow;

type LockKey = (String, DateTime<Utc>, DateTime<Utc>);

/// Ownership-tracked lock map. Entries hold weak references; a key's lock is
/// dropped once no fetch holds or waits on it, and stale entries are pruned
/// on the next lookup.
#[derive(Default)]
pub(crate) struct FetchLocks {
    inner: Mutex<HashMap<LockKey, Weak<tokio::sync::Mutex<()>>>>,
}

impl FetchLocks {
    pub(crate) fn lock_for(&self, station: &str, window: &TimeWindow) -> Arc<tokio::sync::Mutex<()>> {
        let key = (station.to_string(), window.start, window.end);
        let mut map = self.inner.lock().unwrap();
        map.retain(|_, weak| weak.strong_count() > 0);
        if let Some(existing) = map.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        let fresh = Arc::new(tokio::sync::Mutex::new(()));
        map.insert(key, Arc::downgrade(&fresh));
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: &str, end: &str) -> TimeWindow {
        TimeWindow {
            start: DateTime::parse_from_rfc3339(start).unwrap().with_timezone(&Utc),
            end: DateTime::parse_from_rfc3339(end).unwrap().with_timezone(&Utc),
        }
    }

    #[test]
    fn same_key_shares_one_lock() {
        let locks = FetchLocks::default();
        let w = window("2024-01-01T00:00:00Z", "2024-02-01T00:00:00Z");
        let a = locks.lock_for("89064", &w);
        let b = locks.lock_for("89064", &w);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_stations_or_windows_do_not_share() {
        let locks = FetchLocks::default();
        let w1 = window("2024-01-01T00:00:00Z", "2024-02-01T00:00:00Z");
        let w2 = window("2024-02-01T00:00:00Z", "2024-03-01T00:00:00Z");
        let a = locks.lock_for("89064", &w1);
        let b = locks.lock_for("89070", &w1);
        let c = locks.lock_for("89064", &w2);
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn dropped_locks_are_pruned_on_next_lookup() {
        let locks = FetchLocks::default();
        let w = window("2024-01-01T00:00:00Z", "2024-02-01T00:00:00Z");
        {
            let _held = locks.lock_for("89064", &w);
        }
        // All strong references gone; the next lookup mints a fresh lock.
        let again = locks.lock_for("89064", &w);
        assert_eq!(Arc::strong_count(&again), 1);
    }
}
