use crate::fingerprint::JobFingerprint;
use crate::window::InvalidRangeError;

/// Caller-visible job manager failures. Per-window fetch failures are not
/// errors here; they surface through the status object instead.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Malformed range, rejected synchronously at creation.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),

    /// Status or cancel request for a fingerprint the registry doesn't hold.
    #[error("no job found for fingerprint {0}")]
    NotFound(JobFingerprint),
}
