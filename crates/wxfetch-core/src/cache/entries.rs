//! Cache entry reads and writes.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use super::db::{unix_timestamp, CacheStore};
use super::types::{CacheEntry, CachedWindowSummary};
use crate::window::TimeWindow;

/// Canonical key form of a window bound. The splitter emits second-precision
/// UTC timestamps, so this form is stable per window.
fn bound_key(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_bound(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("malformed window bound in cache: {s}"))?
        .with_timezone(&Utc))
}

fn fetched_at_from_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

impl CacheStore {
    /// Look up the cached entry for (station, window). Local lookup only;
    /// never blocks on the network.
    pub async fn get(&self, station_id: &str, window: &TimeWindow) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            r#"
            SELECT payload, fetched_at, upstream_status
            FROM window_cache
            WHERE station_id = ?1 AND window_start = ?2 AND window_end = ?3
            "#,
        )
        .bind(station_id)
        .bind(bound_key(window.start))
        .bind(bound_key(window.end))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: Vec<u8> = row.get("payload");
        let fetched_at: i64 = row.get("fetched_at");
        let upstream_status: i64 = row.get("upstream_status");

        Ok(Some(CacheEntry {
            station_id: station_id.to_string(),
            window: *window,
            payload,
            fetched_at: fetched_at_from_secs(fetched_at),
            upstream_status: upstream_status as u32,
        }))
    }

    /// Upsert the entry for (station, window). A single statement, so a
    /// concurrent `get` sees either the old row or the new one, never a
    /// partial write. Once this returns, `get` for the same key returns the
    /// entry until it is overwritten.
    pub async fn put(
        &self,
        station_id: &str,
        window: &TimeWindow,
        payload: &[u8],
        upstream_status: u32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO window_cache (
                station_id, window_start, window_end,
                payload, fetched_at, upstream_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(station_id, window_start, window_end)
            DO UPDATE SET
                payload = excluded.payload,
                fetched_at = excluded.fetched_at,
                upstream_status = excluded.upstream_status
            "#,
        )
        .bind(station_id)
        .bind(bound_key(window.start))
        .bind(bound_key(window.end))
        .bind(payload)
        .bind(unix_timestamp())
        .bind(upstream_status as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List cached windows for a station, optionally restricted to windows
    /// overlapping [start, end). Chronological order.
    pub async fn list(
        &self,
        station_id: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<CachedWindowSummary>> {
        let rows = match range {
            Some((start, end)) => {
                sqlx::query(
                    r#"
                    SELECT window_start, window_end, fetched_at, upstream_status, LENGTH(payload) AS payload_bytes
                    FROM window_cache
                    WHERE station_id = ?1 AND window_end > ?2 AND window_start < ?3
                    ORDER BY window_start ASC
                    "#,
                )
                .bind(station_id)
                .bind(bound_key(start))
                .bind(bound_key(end))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT window_start, window_end, fetched_at, upstream_status, LENGTH(payload) AS payload_bytes
                    FROM window_cache
                    WHERE station_id = ?1
                    ORDER BY window_start ASC
                    "#,
                )
                .bind(station_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let window_start: String = row.get("window_start");
            let window_end: String = row.get("window_end");
            let fetched_at: i64 = row.get("fetched_at");
            let upstream_status: i64 = row.get("upstream_status");
            let payload_bytes: i64 = row.get("payload_bytes");

            out.push(CachedWindowSummary {
                window: TimeWindow {
                    start: parse_bound(&window_start)?,
                    end: parse_bound(&window_end)?,
                },
                fetched_at: fetched_at_from_secs(fetched_at),
                upstream_status: upstream_status as u32,
                payload_bytes: payload_bytes as usize,
            });
        }
        Ok(out)
    }
}
