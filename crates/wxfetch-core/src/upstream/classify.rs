//! Classify HTTP statuses and curl errors into the upstream error taxonomy.

use std::time::Duration;

use super::error::UpstreamError;

/// Classify a non-2xx HTTP status. `retry_after` comes from the response
/// headers and only matters for 429.
pub fn classify_http_status(code: u32, retry_after: Option<Duration>) -> UpstreamError {
    match code {
        429 => UpstreamError::RateLimited { retry_after },
        500..=599 => UpstreamError::ServerError(code),
        400..=499 => UpstreamError::ClientError(code),
        // Anything else unexpected (stray 1xx/3xx after redirect following)
        // is treated as a retryable server-side problem.
        _ => UpstreamError::ServerError(code),
    }
}

/// Classify a curl transport error.
pub fn classify_curl_error(e: &curl::Error) -> UpstreamError {
    if e.is_operation_timedout() {
        return UpstreamError::Timeout;
    }
    UpstreamError::Network(e.to_string())
}

/// Parse a `Retry-After` header value. Only the delta-seconds form is
/// honored; the HTTP-date form yields None.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_is_rate_limited_with_delay() {
        let err = classify_http_status(429, Some(Duration::from_secs(5)));
        assert!(matches!(
            err,
            UpstreamError::RateLimited {
                retry_after: Some(d)
            } if d == Duration::from_secs(5)
        ));
    }

    #[test]
    fn http_5xx_is_server_error() {
        assert!(matches!(
            classify_http_status(500, None),
            UpstreamError::ServerError(500)
        ));
        assert!(matches!(
            classify_http_status(503, None),
            UpstreamError::ServerError(503)
        ));
    }

    #[test]
    fn http_4xx_other_than_429_is_client_error() {
        assert!(matches!(
            classify_http_status(404, None),
            UpstreamError::ClientError(404)
        ));
        assert!(matches!(
            classify_http_status(403, None),
            UpstreamError::ClientError(403)
        ));
    }

    #[test]
    fn retry_after_parses_delta_seconds_only() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 120 "), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after(""), None);
    }
}
