//! Job, window state, and status types.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::fingerprint::JobFingerprint;
use crate::window::{TimeWindow, WindowUnit};

/// Lifecycle of one (job, window) pair.
///
/// `CachedHit` and `FetchedOk` are both terminal success; `Failed` is
/// terminal failure after retries exhaust. Terminal states never revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Pending,
    Fetching,
    CachedHit,
    FetchedOk,
    Failed,
}

impl WindowState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WindowState::CachedHit | WindowState::FetchedOk | WindowState::Failed
        )
    }
}

/// Aggregate job state visible to polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Running)
    }
}

/// Derived status object, the wire shape polling clients consume.
///
/// Invariant: `cached_windows <= completed_windows <= total_windows`, and all
/// three are monotonically non-decreasing across successive polls of the
/// same job.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub total_windows: usize,
    pub completed_windows: usize,
    pub cached_windows: usize,
    pub message: String,
    pub state: JobState,
}

/// One registered job. Window states are mutated only by the processing
/// task's completion handler; everything else reads snapshots.
pub(crate) struct JobHandle {
    pub(crate) fingerprint: JobFingerprint,
    pub(crate) station_id: String,
    pub(crate) unit: WindowUnit,
    pub(crate) windows: Vec<TimeWindow>,
    pub(crate) created_at: DateTime<Utc>,
    states: Mutex<Vec<WindowState>>,
    cancelled: AtomicBool,
    finished_at: Mutex<Option<Instant>>,
}

impl JobHandle {
    pub(crate) fn new(
        fingerprint: JobFingerprint,
        station_id: &str,
        windows: Vec<TimeWindow>,
        unit: WindowUnit,
    ) -> Self {
        let states = vec![WindowState::Pending; windows.len()];
        Self {
            fingerprint,
            station_id: station_id.to_string(),
            unit,
            windows,
            created_at: Utc::now(),
            states: Mutex::new(states),
            cancelled: AtomicBool::new(false),
            finished_at: Mutex::new(None),
        }
    }

    /// Transition one window. Ignored if the window is already terminal, so
    /// aggregate counts never move backwards.
    pub(crate) fn set_window_state(&self, idx: usize, next: WindowState) {
        let mut states = self.states.lock().unwrap();
        if states[idx].is_terminal() {
            return;
        }
        states[idx] = next;
    }

    /// Snapshot of all window states.
    pub(crate) fn window_states(&self) -> Vec<WindowState> {
        self.states.lock().unwrap().clone()
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Record completion time for registry retention. First call wins.
    pub(crate) fn mark_finished(&self) {
        let mut finished = self.finished_at.lock().unwrap();
        if finished.is_none() {
            *finished = Some(Instant::now());
        }
    }

    /// Time since the job finished, if it has.
    pub(crate) fn finished_elapsed(&self) -> Option<Duration> {
        self.finished_at.lock().unwrap().map(|t| t.elapsed())
    }
}
