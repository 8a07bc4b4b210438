//! Per-job and per-window processing.

use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::cache::CacheEntry;
use crate::retry::{classify_admit_timeout, classify_upstream, RetryDecision};
use crate::window::TimeWindow;

use super::manager::ManagerInner;
use super::status::project;
use super::types::{JobHandle, WindowState};

/// Drives one job: schedules window processing with bounded concurrency and
/// marks the job finished when the last task drains. Cancellation stops new
/// windows from being scheduled; in-flight windows run to their next
/// suspension point.
pub(crate) async fn process_job(inner: Arc<ManagerInner>, handle: Arc<JobHandle>) {
    let total = handle.windows.len();
    let max_in_flight = inner.opts.max_in_flight.max(1);
    let mut next = 0usize;
    let mut join_set = JoinSet::new();

    loop {
        while join_set.len() < max_in_flight && next < total && !handle.cancelled() {
            let inner = Arc::clone(&inner);
            let handle = Arc::clone(&handle);
            let idx = next;
            join_set.spawn(async move {
                process_window(inner, handle, idx).await;
            });
            next += 1;
        }
        if join_set.join_next().await.is_none() {
            break;
        }
    }

    handle.mark_finished();
    let status = project(&handle);
    tracing::info!(
        fingerprint = %handle.fingerprint,
        state = status.state.as_str(),
        completed = status.completed_windows,
        cached = status.cached_windows,
        "job finished"
    );
}

/// One window's pipeline: cache consult, then fetch under the per-key lock
/// with rate limiting and bounded retries, writing through the cache before
/// the window is reported complete.
async fn process_window(inner: Arc<ManagerInner>, handle: Arc<JobHandle>, idx: usize) {
    let window = handle.windows[idx];
    let station = handle.station_id.clone();

    if cache_lookup(&inner, &station, &window).await.is_some() {
        handle.set_window_state(idx, WindowState::CachedHit);
        tracing::debug!(station = %station, window = %window, "window served from cache");
        return;
    }

    handle.set_window_state(idx, WindowState::Fetching);

    let lock = inner.locks.lock_for(&station, &window);
    let _fetch_guard = lock.lock().await;

    // Another job may have fetched this window while we waited on the lock.
    if cache_lookup(&inner, &station, &window).await.is_some() {
        handle.set_window_state(idx, WindowState::CachedHit);
        tracing::debug!(station = %station, window = %window, "window cached by a concurrent job");
        return;
    }

    let mut attempt = 1u32;
    loop {
        if handle.cancelled() {
            handle.set_window_state(idx, WindowState::Failed);
            tracing::debug!(station = %station, window = %window, "window abandoned by cancellation");
            return;
        }

        let kind = match inner.limiter.admit(&station, inner.opts.admit_timeout).await {
            Ok(()) => {
                let client = Arc::clone(&inner.upstream);
                let fetch_station = station.clone();
                let joined =
                    tokio::task::spawn_blocking(move || client.fetch(&fetch_station, &window))
                        .await;
                match joined {
                    Ok(Ok(payload)) => {
                        // Write-through: the cache write must land before the
                        // window is reported complete.
                        match inner
                            .cache
                            .put(&station, &window, &payload.body, payload.status)
                            .await
                        {
                            Ok(()) => {
                                handle.set_window_state(idx, WindowState::FetchedOk);
                                tracing::debug!(
                                    station = %station,
                                    window = %window,
                                    attempt,
                                    bytes = payload.body.len(),
                                    "window fetched"
                                );
                                return;
                            }
                            Err(e) => {
                                // Storage failures are not retried.
                                tracing::error!(
                                    station = %station,
                                    window = %window,
                                    error = %e,
                                    "cache write failed"
                                );
                                handle.set_window_state(idx, WindowState::Failed);
                                return;
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(
                            station = %station,
                            window = %window,
                            attempt,
                            error = %e,
                            "window fetch failed"
                        );
                        classify_upstream(&e)
                    }
                    Err(e) => {
                        tracing::error!(station = %station, window = %window, error = %e, "fetch task panicked");
                        handle.set_window_state(idx, WindowState::Failed);
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(station = %station, window = %window, attempt, error = %e, "admission timed out");
                classify_admit_timeout(&e)
            }
        };

        match inner.retry.decide(attempt, kind) {
            RetryDecision::GiveUp => {
                tracing::warn!(
                    station = %station,
                    window = %window,
                    attempt,
                    "window failed after final attempt"
                );
                handle.set_window_state(idx, WindowState::Failed);
                return;
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(station = %station, window = %window, attempt, delay_ms = delay.as_millis() as u64, "retrying window");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Cache consult, applying the optional freshness bound. Read failures are
/// logged and treated as misses so a degraded cache degrades to refetching.
async fn cache_lookup(
    inner: &ManagerInner,
    station: &str,
    window: &TimeWindow,
) -> Option<CacheEntry> {
    match inner.cache.get(station, window).await {
        Ok(Some(entry)) => {
            if let Some(freshness) = inner.opts.cache_freshness {
                if entry.age(Utc::now()) > freshness {
                    return None;
                }
            }
            Some(entry)
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(station = %station, window = %window, error = %e, "cache read failed; treating as miss");
            None
        }
    }
}
