//! SQLite-backed cache store: connection, migration, timestamp helpers.
//! Entry reads and writes live in `entries`.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special
/// chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}?mode=rwc", out)
}

/// Handle to the durable window cache.
///
/// The database file lives under the XDG state directory:
/// `~/.local/state/wxfetch/cache.db`.
#[derive(Clone)]
pub struct CacheStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl CacheStore {
    /// Open (or create) the default cache database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("wxfetch")?;
        let state_dir = xdg_dirs.get_state_home().join("wxfetch");
        let db_path = state_dir.join("cache.db");

        tokio::fs::create_dir_all(&state_dir).await?;

        let uri = path_to_sqlite_uri(&db_path);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;

        let store = CacheStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open (or create) the cache at a specific path. Creates parent dirs if
    /// needed. Intended for tests so the DB can live in a temp directory.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let store = CacheStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // One row per (station, window). The payload is the raw upstream
        // document; window bounds are RFC 3339 strings so lexicographic order
        // matches chronological order for range listings.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS window_cache (
                station_id TEXT NOT NULL,
                window_start TEXT NOT NULL,
                window_end TEXT NOT NULL,
                payload BLOB NOT NULL,
                fetched_at INTEGER NOT NULL,
                upstream_status INTEGER NOT NULL,
                PRIMARY KEY (station_id, window_start, window_end)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for fetch timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory cache for tests (no disk I/O). A single connection keeps
/// every query on the same in-memory database.
pub(crate) async fn open_memory() -> Result<CacheStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = CacheStore { pool };
    store.migrate().await?;
    Ok(store)
}
