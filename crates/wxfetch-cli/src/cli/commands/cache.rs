//! `wxfetch cache` – list durable cache entries for a station.

use anyhow::Result;

use wxfetch_core::cache::CacheStore;

use super::parse_time;

pub async fn run_cache(station: &str, start: Option<&str>, end: Option<&str>) -> Result<()> {
    let range = match (start, end) {
        (Some(s), Some(e)) => Some((parse_time(s)?, parse_time(e)?)),
        (None, None) => None,
        _ => anyhow::bail!("--start and --end must be given together"),
    };

    let store = CacheStore::open_default().await?;
    let entries = store.list(station, range).await?;
    if entries.is_empty() {
        println!("No cached windows for station {station}.");
        return Ok(());
    }

    println!(
        "{:<22} {:<22} {:<8} {:<10} {}",
        "START", "END", "STATUS", "BYTES", "FETCHED AT"
    );
    for entry in entries {
        println!(
            "{:<22} {:<22} {:<8} {:<10} {}",
            entry.window.start.format("%Y-%m-%dT%H:%M:%SZ"),
            entry.window.end.format("%Y-%m-%dT%H:%M:%SZ"),
            entry.upstream_status,
            entry.payload_bytes,
            entry.fetched_at.format("%Y-%m-%dT%H:%M:%SZ"),
        );
    }
    Ok(())
}
