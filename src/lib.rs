//! Song-asset download authorization and cache subsystem
//!
//! Backend core for serving rhythm-game song assets: it mirrors the on-disk
//! song tree into a local SQLite metadata cache, interprets the songlist
//! catalogue into per-song file rules and entitlement indexes, and builds
//! per-user download manifests with single-use, time-limited tokens.
//!
//! The HTTP layer that binds URLs and streams bytes is a consumer of this
//! crate, not part of it; only the URL template and the `download_token`
//! table surface are shared with it.

pub mod config;
pub mod error;
pub mod model;
pub mod service;

// Re-export commonly used types for convenience
pub use config::{Config, Constants, CONFIG};
pub use error::{ArcError, ArcResult};

use colored::Colorize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use std::fs;
use std::path::Path;

/// Database connection pool type alias
pub type DbPool = sqlx::SqlitePool;

/// Primary database connection manager
pub struct Database;

impl Database {
    /// Open (creating if necessary) the primary database and make sure the
    /// `download_token` table exists.
    ///
    /// The table is keyed by `(user_id, song_id, file_name)` so that a
    /// repeated request replaces the user's previous token for the same
    /// file in place; the extra index serves the byte-handler's lookup by
    /// `(song_id, file_name, token)`.
    pub async fn init(sqlite_path: &str) -> ArcResult<DbPool> {
        if let Some(parent) = Path::new(sqlite_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(sqlite_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS download_token (
                user_id INTEGER NOT NULL,
                song_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                token TEXT NOT NULL,
                time INTEGER NOT NULL,
                PRIMARY KEY (user_id, song_id, file_name)
            );",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_download_token_lookup
             ON download_token (song_id, file_name, token);",
        )
        .execute(&pool)
        .await?;

        println!(
            "{} {}",
            "Primary database ready:".green().bold(),
            sqlite_path.blue().bold()
        );

        Ok(pool)
    }

    /// Check if the database connection is healthy
    pub async fn check_health(pool: &DbPool) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}

/// Utility functions for the application
pub mod utils {
    use std::fs::{File, Metadata};
    use std::io::Read;
    use std::path::Path;
    use std::time::{SystemTime, UNIX_EPOCH};

    /// Get current timestamp in seconds
    pub fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Modification time of a stat result as nanoseconds since the epoch.
    ///
    /// A pre-epoch or unreadable mtime collapses to 0, which only ever
    /// causes an extra rescan.
    pub fn mtime_ns(metadata: &Metadata) -> i64 {
        metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }

    /// Hex MD5 digest of a byte slice
    pub fn md5_hex(bytes: &[u8]) -> String {
        format!("{:x}", md5::compute(bytes))
    }

    /// Streaming hex MD5 digest of a file's contents
    pub fn file_md5(path: &Path) -> std::io::Result<String> {
        let mut file = File::open(path)?;
        let mut context = md5::Context::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            context.consume(&buf[..n]);
        }
        Ok(format!("{:x}", context.compute()))
    }
}

/// Prelude module for commonly used imports
pub mod prelude {
    pub use crate::config::{Config, Constants, CONFIG};
    pub use crate::error::{ArcError, ArcResult};
    pub use crate::model::{DownloadAudio, DownloadFile, DownloadSong, DownloadToken, UserInfo};
    pub use crate::service::{
        ArcLimiter, AssetManager, DownloadService, SongFileCache, SonglistData,
    };
    pub use crate::utils;
    pub use crate::DbPool;
}
