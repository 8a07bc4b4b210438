//! `wxfetch run` – create a fetch job and poll it to completion.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use wxfetch_core::cache::CacheStore;
use wxfetch_core::config;
use wxfetch_core::job::{JobManager, JobState};
use wxfetch_core::upstream::AemetClient;
use wxfetch_core::window::WindowUnit;

use super::parse_time;

pub async fn run_fetch(
    station: &str,
    start: &str,
    end: &str,
    unit: &str,
    interval_secs: u64,
) -> Result<()> {
    let cfg = config::load_or_init()?;
    let start = parse_time(start)?;
    let end = parse_time(end)?;
    let unit: WindowUnit = unit.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let api_key = std::env::var(&cfg.upstream.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!(
            "environment variable {} is not set; upstream requests will be rejected",
            cfg.upstream.api_key_env
        );
    }

    let cache = CacheStore::open_default().await?;
    let client = Arc::new(AemetClient::new(&cfg.upstream, api_key));
    let manager = JobManager::new(cache, client, &cfg);

    let fingerprint = manager.create_job(station, start, end, unit)?;
    println!("job {fingerprint}");

    let interval = Duration::from_secs(interval_secs.max(1));
    loop {
        let status = manager
            .status(&fingerprint)
            .context("job evicted while polling")?;
        println!(
            "{:<8} {}/{} windows done, {} cached  {}",
            status.state.as_str(),
            status.completed_windows,
            status.total_windows,
            status.cached_windows,
            status.message
        );
        if status.state.is_terminal() {
            if status.state == JobState::Failed {
                anyhow::bail!("job did not fully succeed: {}", status.message);
            }
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
}
