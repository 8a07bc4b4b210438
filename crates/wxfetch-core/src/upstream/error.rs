//! Upstream error taxonomy.

use std::time::Duration;

/// Classified failure of a single window fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// HTTP 429; carries the server's `Retry-After` delay when present.
    #[error("upstream rate limited (HTTP 429)")]
    RateLimited { retry_after: Option<Duration> },

    /// HTTP 5xx.
    #[error("upstream server error (HTTP {0})")]
    ServerError(u32),

    /// HTTP 4xx other than 429. Not retried.
    #[error("upstream client error (HTTP {0})")]
    ClientError(u32),

    /// Connect or read timeout.
    #[error("upstream request timed out")]
    Timeout,

    /// Transport failure other than a timeout (DNS, reset, etc.).
    #[error("upstream network error: {0}")]
    Network(String),

    /// Response body could not be decoded (e.g. malformed metadata envelope).
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
}
