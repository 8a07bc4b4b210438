//! Deterministic job identity.
//!
//! A fingerprint is derived from the request parameters only, so two creation
//! requests for the same (station, range, unit) name the same logical job and
//! creation stays idempotent.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::window::WindowUnit;

/// Identity of a logical job. Equal fingerprints mean equal request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct JobFingerprint(String);

impl JobFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the fingerprint for a creation request.
pub fn fingerprint(
    station_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    unit: WindowUnit,
) -> JobFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(station_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(start.to_rfc3339_opts(SecondsFormat::Secs, true).as_bytes());
    hasher.update(b"\n");
    hasher.update(end.to_rfc3339_opts(SecondsFormat::Secs, true).as_bytes());
    hasher.update(b"\n");
    hasher.update(unit.as_str().as_bytes());
    JobFingerprint(hex::encode(hasher.finalize()))
}
