//! Job registry and public manager API.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::CacheStore;
use crate::config::{JobsConfig, WxConfig};
use crate::fingerprint::{fingerprint, JobFingerprint};
use crate::ratelimit::StationLimiter;
use crate::retry::RetryPolicy;
use crate::upstream::UpstreamClient;
use crate::window::{self, WindowUnit};

use super::error::JobError;
use super::lock::FetchLocks;
use super::process;
use super::status::project;
use super::types::{JobHandle, JobStatus};

/// Tuning knobs for job processing.
#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    /// Maximum simultaneous in-flight window fetches per job.
    pub max_in_flight: usize,
    /// How long one fetch attempt waits for rate limiter admission.
    pub admit_timeout: Duration,
    /// How long a completed job stays in the registry.
    pub retention: Duration,
    /// Optional cache freshness bound; older entries count as misses.
    pub cache_freshness: Option<Duration>,
}

impl From<&JobsConfig> for JobOptions {
    fn from(cfg: &JobsConfig) -> Self {
        Self {
            max_in_flight: cfg.max_in_flight.max(1),
            admit_timeout: cfg.admit_timeout(),
            retention: cfg.retention(),
            cache_freshness: cfg.cache_freshness(),
        }
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        (&JobsConfig::default()).into()
    }
}

pub(crate) struct ManagerInner {
    pub(crate) cache: CacheStore,
    pub(crate) upstream: Arc<dyn UpstreamClient>,
    pub(crate) limiter: StationLimiter,
    pub(crate) retry: RetryPolicy,
    pub(crate) locks: FetchLocks,
    pub(crate) opts: JobOptions,
    jobs: Mutex<HashMap<JobFingerprint, Arc<JobHandle>>>,
}

/// Owns the registry of jobs keyed by fingerprint and drives their
/// processing. One instance per service process; must be used from within a
/// tokio runtime, since creation spawns the processing task.
pub struct JobManager {
    inner: Arc<ManagerInner>,
}

impl JobManager {
    /// Assemble a manager from loaded configuration.
    pub fn new(cache: CacheStore, upstream: Arc<dyn UpstreamClient>, cfg: &WxConfig) -> Self {
        let limiter = StationLimiter::new(cfg.rate_limit.capacity, cfg.rate_limit.refill_per_sec);
        let retry: RetryPolicy = cfg.retry.clone().unwrap_or_default().into();
        Self::with_parts(cache, upstream, limiter, retry, (&cfg.jobs).into())
    }

    /// Assemble a manager from explicit parts (tests and embedding).
    pub fn with_parts(
        cache: CacheStore,
        upstream: Arc<dyn UpstreamClient>,
        limiter: StationLimiter,
        retry: RetryPolicy,
        opts: JobOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                cache,
                upstream,
                limiter,
                retry,
                locks: FetchLocks::default(),
                opts,
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create (or reuse) the job for (station, range, unit).
    ///
    /// Idempotent: while a job with the same fingerprint is active or within
    /// its retention period, the same fingerprint is returned and no new
    /// upstream work is scheduled. Rejects `start >= end` synchronously.
    pub fn create_job(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        unit: WindowUnit,
    ) -> Result<JobFingerprint, JobError> {
        let windows = window::split(start, end, unit)?;
        let fp = fingerprint(station_id, start, end, unit);

        let mut jobs = self.inner.jobs.lock().unwrap();
        evict_expired(&mut jobs, self.inner.opts.retention);

        if jobs.contains_key(&fp) {
            tracing::debug!(fingerprint = %fp, "reusing registered job");
            return Ok(fp);
        }

        let handle = Arc::new(JobHandle::new(fp.clone(), station_id, windows, unit));
        tracing::info!(
            fingerprint = %fp,
            station = station_id,
            windows = handle.windows.len(),
            created_at = %handle.created_at,
            "job registered"
        );
        jobs.insert(fp.clone(), Arc::clone(&handle));
        drop(jobs);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(process::process_job(inner, handle));
        Ok(fp)
    }

    /// Current status of a job. Pure synchronous read of derived state.
    pub fn status(&self, fp: &JobFingerprint) -> Result<JobStatus, JobError> {
        let mut jobs = self.inner.jobs.lock().unwrap();
        evict_expired(&mut jobs, self.inner.opts.retention);
        jobs.get(fp)
            .map(|handle| project(handle))
            .ok_or_else(|| JobError::NotFound(fp.clone()))
    }

    /// Cancel a job: no new window fetches are scheduled, in-flight fetches
    /// finish their cache write, and the job reports `failed` with a
    /// cancellation message.
    pub fn cancel(&self, fp: &JobFingerprint) -> Result<(), JobError> {
        let jobs = self.inner.jobs.lock().unwrap();
        let handle = jobs.get(fp).ok_or_else(|| JobError::NotFound(fp.clone()))?;
        handle.cancel();
        tracing::info!(fingerprint = %fp, "job cancelled");
        Ok(())
    }
}

fn evict_expired(jobs: &mut HashMap<JobFingerprint, Arc<JobHandle>>, retention: Duration) {
    jobs.retain(|fp, handle| match handle.finished_elapsed() {
        Some(elapsed) if elapsed >= retention => {
            tracing::debug!(fingerprint = %fp, "evicting completed job from registry");
            false
        }
        _ => true,
    });
}
