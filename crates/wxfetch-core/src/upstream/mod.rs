//! Upstream API client.
//!
//! One call fetches one window's data for one station. The trait keeps the
//! job manager independent of the wire protocol; `AemetClient` is the real
//! libcurl-backed implementation. Error classification here is the single
//! source of truth the retry policy consumes.

mod aemet;
mod classify;
mod error;

pub use aemet::AemetClient;
pub use classify::{classify_curl_error, classify_http_status, parse_retry_after};
pub use error::UpstreamError;

use crate::window::TimeWindow;

/// Result of a successful window fetch.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Raw upstream document (JSON measurement array).
    pub body: Vec<u8>,
    /// HTTP status of the data response.
    pub status: u32,
}

/// Fetches one window's data from the external API.
///
/// Implementations block on network I/O; callers in async code run them via
/// `spawn_blocking`.
pub trait UpstreamClient: Send + Sync + 'static {
    fn fetch(&self, station_id: &str, window: &TimeWindow) -> Result<Payload, UpstreamError>;
}
