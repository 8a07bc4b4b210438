use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Upstream API parameters (section `[upstream]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream OpenData API.
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://opendata.aemet.es/opendata/api".to_string(),
            api_key_env: "AEMET_API_KEY".to_string(),
            connect_timeout_secs: 15,
            request_timeout_secs: 30,
        }
    }
}

/// Per-station token bucket parameters (section `[rate_limit]`).
///
/// The upstream's real limits are unconfirmed, so these defaults are a
/// conservative placeholder rather than a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity (maximum burst of admitted calls per station).
    pub capacity: f64,
    /// Refill rate in tokens per second.
    pub refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 5.0,
            refill_per_sec: 1.0,
        }
    }
}

/// Retry policy parameters (optional section `[retry]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per window (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 60,
        }
    }
}

/// Job manager parameters (section `[jobs]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Maximum simultaneous in-flight window fetches per job.
    pub max_in_flight: usize,
    /// How long a fetch waits for rate limiter admission before the attempt
    /// counts as failed (seconds).
    pub admit_timeout_secs: u64,
    /// How long a completed job stays in the registry before eviction (seconds).
    pub retention_secs: u64,
    /// Optional cache freshness bound in seconds: entries older than this are
    /// treated as misses when a job consults the cache. None keeps every
    /// entry valid until overwritten.
    #[serde(default)]
    pub cache_freshness_secs: Option<u64>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            admit_timeout_secs: 30,
            retention_secs: 300,
            cache_freshness_secs: None,
        }
    }
}

/// Global configuration loaded from `~/.config/wxfetch/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WxConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl JobsConfig {
    pub fn admit_timeout(&self) -> Duration {
        Duration::from_secs(self.admit_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn cache_freshness(&self) -> Option<Duration> {
        self.cache_freshness_secs.map(Duration::from_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("wxfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<WxConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = WxConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: WxConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = WxConfig::default();
        assert_eq!(cfg.rate_limit.capacity, 5.0);
        assert_eq!(cfg.rate_limit.refill_per_sec, 1.0);
        assert_eq!(cfg.jobs.max_in_flight, 4);
        assert_eq!(cfg.jobs.retention_secs, 300);
        assert!(cfg.jobs.cache_freshness_secs.is_none());
        assert!(cfg.retry.is_none());
        assert_eq!(cfg.upstream.api_key_env, "AEMET_API_KEY");
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = WxConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: WxConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.rate_limit.capacity, cfg.rate_limit.capacity);
        assert_eq!(parsed.jobs.max_in_flight, cfg.jobs.max_in_flight);
        assert_eq!(parsed.upstream.base_url, cfg.upstream.base_url);
    }

    #[test]
    fn config_toml_partial_sections_fall_back_to_defaults() {
        let toml = r#"
            [rate_limit]
            capacity = 2.0
            refill_per_sec = 0.5
        "#;
        let cfg: WxConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.rate_limit.capacity, 2.0);
        assert_eq!(cfg.jobs.max_in_flight, 4);
        assert_eq!(cfg.upstream.connect_timeout_secs, 15);
    }

    #[test]
    fn config_toml_retry_and_freshness() {
        let toml = r#"
            [jobs]
            max_in_flight = 2
            admit_timeout_secs = 10
            retention_secs = 60
            cache_freshness_secs = 10800

            [retry]
            max_attempts = 3
            base_delay_secs = 0.5
            max_delay_secs = 15
        "#;
        let cfg: WxConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.jobs.cache_freshness(), Some(Duration::from_secs(10800)));
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert!((retry.base_delay_secs - 0.5).abs() < 1e-9);
        assert_eq!(retry.max_delay_secs, 15);
    }
}
