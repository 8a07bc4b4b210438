//! Status projection: internal job state to the externally visible object.

use super::types::{JobHandle, JobState, JobStatus, WindowState};

/// Derive the status object from a job's current window states. Pure read,
/// no side effects.
pub(crate) fn project(handle: &JobHandle) -> JobStatus {
    let states = handle.window_states();
    let total_windows = states.len();
    let completed_windows = states.iter().filter(|s| s.is_terminal()).count();
    let cached_windows = states
        .iter()
        .filter(|s| matches!(s, WindowState::CachedHit))
        .count();
    let failed = states
        .iter()
        .filter(|s| matches!(s, WindowState::Failed))
        .count();

    let noun = handle.unit.noun();
    let (state, message) = if completed_windows == total_windows {
        if failed == 0 {
            (JobState::Done, format!("All {noun}s loaded."))
        } else {
            (
                JobState::Failed,
                format!("Completed with {failed} failed {noun}s."),
            )
        }
    } else if handle.cancelled() {
        (JobState::Failed, "Cancelled before completion.".to_string())
    } else {
        (JobState::Running, format!("Fetching missing {noun}s."))
    };

    JobStatus {
        total_windows,
        completed_windows,
        cached_windows,
        message,
        state,
    }
}
