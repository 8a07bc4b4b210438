//! Map failure sources onto the retry policy's error kinds.

use super::policy::ErrorKind;
use crate::ratelimit::RateLimitTimeoutError;
use crate::upstream::UpstreamError;

/// Classify an upstream fetch failure.
pub fn classify_upstream(e: &UpstreamError) -> ErrorKind {
    match e {
        UpstreamError::RateLimited { retry_after } => ErrorKind::Throttled {
            retry_after: *retry_after,
        },
        UpstreamError::ServerError(code) => ErrorKind::Server(*code),
        UpstreamError::ClientError(code) => ErrorKind::Client(*code),
        UpstreamError::Timeout => ErrorKind::Timeout,
        UpstreamError::Network(_) | UpstreamError::Decode(_) => ErrorKind::Network,
    }
}

/// A saturated local rate limiter is a transient condition, classified like
/// any other timeout.
pub fn classify_admit_timeout(_e: &RateLimitTimeoutError) -> ErrorKind {
    ErrorKind::Timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rate_limited_keeps_the_retry_after_delay() {
        let kind = classify_upstream(&UpstreamError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        });
        assert_eq!(
            kind,
            ErrorKind::Throttled {
                retry_after: Some(Duration::from_secs(5))
            }
        );
    }

    #[test]
    fn statuses_map_to_their_kinds() {
        assert_eq!(
            classify_upstream(&UpstreamError::ServerError(502)),
            ErrorKind::Server(502)
        );
        assert_eq!(
            classify_upstream(&UpstreamError::ClientError(404)),
            ErrorKind::Client(404)
        );
        assert_eq!(classify_upstream(&UpstreamError::Timeout), ErrorKind::Timeout);
        assert_eq!(
            classify_upstream(&UpstreamError::Network("reset".into())),
            ErrorKind::Network
        );
        assert_eq!(
            classify_upstream(&UpstreamError::Decode("bad json".into())),
            ErrorKind::Network
        );
    }

    #[test]
    fn admission_timeout_is_transient() {
        let err = RateLimitTimeoutError {
            station: "89064".into(),
            waited: Duration::from_secs(30),
        };
        assert_eq!(classify_admit_timeout(&err), ErrorKind::Timeout);
    }
}
