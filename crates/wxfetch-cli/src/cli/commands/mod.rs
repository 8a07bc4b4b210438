mod cache;
mod run;

pub use cache::run_cache;
pub use run::run_fetch;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

/// Parse a time argument: RFC 3339, or a bare date taken as UTC midnight.
pub(crate) fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        anyhow::anyhow!("unrecognized time '{s}' (expected RFC 3339 or YYYY-MM-DD)")
    })?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("unrepresentable date '{s}'"))?;
    Ok(midnight.and_utc())
}
