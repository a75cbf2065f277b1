//! Persistent file-metadata cache for the on-disk song tree
//!
//! Mirrors `SONG_FILE_FOLDER_PATH` into a small SQLite database
//! (`song_cache.db`) so that directory enumeration and MD5 hashing only
//! happen when something actually changed. Directory mtimes gate
//! re-enumeration; `(size, mtime_ns)` pairs gate re-hashing. A stat that
//! comes back "not found" after a path was previously seen prunes the
//! affected rows, so the store never outlives the tree it mirrors.

use crate::error::ArcResult;
use crate::service::songlist::SonglistData;
use crate::utils;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

/// Metadata cache over one song tree
#[derive(Debug)]
pub struct SongFileCache {
    pool: SqlitePool,
    song_folder: PathBuf,
    pre_calculate_hashes: bool,
    schema: OnceCell<()>,
}

impl SongFileCache {
    /// Open (creating if necessary) the cache database at `db_path`.
    ///
    /// WAL with normal-durability commits lets request workers read while
    /// a sync writes.
    pub async fn open(
        db_path: &Path,
        song_folder: impl Into<PathBuf>,
        pre_calculate_hashes: bool,
    ) -> ArcResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Ok(Self {
            pool,
            song_folder: song_folder.into(),
            pre_calculate_hashes,
            schema: OnceCell::new(),
        })
    }

    /// Idempotently create the tables and indexes.
    ///
    /// Safe to call from any task; the first caller wins, later callers
    /// return immediately.
    pub async fn ensure_schema(&self) -> ArcResult<()> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(
                    "CREATE TABLE IF NOT EXISTS meta (
                        key TEXT PRIMARY KEY,
                        value TEXT NOT NULL
                    );",
                )
                .execute(&self.pool)
                .await?;
                sqlx::query(
                    "CREATE TABLE IF NOT EXISTS songs (
                        song_id TEXT PRIMARY KEY,
                        dir_mtime_ns INTEGER NOT NULL,
                        last_scan INTEGER NOT NULL
                    );",
                )
                .execute(&self.pool)
                .await?;
                sqlx::query(
                    "CREATE TABLE IF NOT EXISTS files (
                        song_id TEXT NOT NULL,
                        file_name TEXT NOT NULL,
                        size INTEGER NOT NULL,
                        mtime_ns INTEGER NOT NULL,
                        md5 TEXT,
                        last_seen INTEGER NOT NULL,
                        PRIMARY KEY (song_id, file_name)
                    );",
                )
                .execute(&self.pool)
                .await?;
                sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_song_id ON files(song_id);")
                    .execute(&self.pool)
                    .await?;
                Ok::<(), crate::error::ArcError>(())
            })
            .await?;
        Ok(())
    }

    fn song_dir(&self, song_id: &str) -> PathBuf {
        self.song_folder.join(song_id)
    }

    /// Drop a song and all of its file rows
    pub async fn delete_song(&self, song_id: &str) -> ArcResult<()> {
        self.ensure_schema().await?;
        sqlx::query("DELETE FROM files WHERE song_id = ?;")
            .bind(song_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM songs WHERE song_id = ?;")
            .bind(song_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop a single file row
    pub async fn delete_file(&self, song_id: &str, file_name: &str) -> ArcResult<()> {
        self.ensure_schema().await?;
        sqlx::query("DELETE FROM files WHERE song_id = ? AND file_name = ?;")
            .bind(song_id)
            .bind(file_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bring the rows for one song directory up to date.
    ///
    /// With `dir_mtime_ns` supplied and equal to the stored value this is
    /// a single SELECT; otherwise the directory is enumerated, illegal and
    /// vanished file rows are pruned, and changed files are re-stat'd (and
    /// re-hashed when pre-hashing is on).
    pub async fn sync_song(
        &self,
        songlist: &SonglistData,
        song_id: &str,
        dir_mtime_ns: Option<i64>,
    ) -> ArcResult<()> {
        self.ensure_schema().await?;

        let song_dir = self.song_dir(song_id);
        let dir_meta = match fs::metadata(&song_dir) {
            Ok(meta) if meta.is_dir() => meta,
            _ => {
                self.delete_song(song_id).await?;
                return Ok(());
            }
        };
        let dir_mtime_ns = dir_mtime_ns.unwrap_or_else(|| utils::mtime_ns(&dir_meta));

        let stored = sqlx::query("SELECT dir_mtime_ns FROM songs WHERE song_id = ?;")
            .bind(song_id)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = stored {
            if row.try_get::<i64, _>(0)? == dir_mtime_ns {
                return Ok(());
            }
        }

        let now = utils::current_timestamp();
        sqlx::query("INSERT OR REPLACE INTO songs(song_id, dir_mtime_ns, last_scan) VALUES(?,?,?);")
            .bind(song_id)
            .bind(dir_mtime_ns)
            .bind(now)
            .execute(&self.pool)
            .await?;

        // Enumeration racing a delete counts as a missing directory.
        let entries = match fs::read_dir(&song_dir) {
            Ok(entries) => entries,
            Err(_) => {
                self.delete_song(song_id).await?;
                return Ok(());
            }
        };
        let mut file_names = Vec::new();
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if songlist.is_available_file(song_id, name) {
                    file_names.push(name.to_string());
                }
            }
        }

        if file_names.is_empty() {
            sqlx::query("DELETE FROM files WHERE song_id = ?;")
                .bind(song_id)
                .execute(&self.pool)
                .await?;
            return Ok(());
        }

        let placeholders = vec!["?"; file_names.len()].join(",");
        let sql =
            format!("DELETE FROM files WHERE song_id = ? AND file_name NOT IN ({placeholders});");
        let mut query = sqlx::query(&sql).bind(song_id);
        for name in &file_names {
            query = query.bind(name);
        }
        query.execute(&self.pool).await?;

        for file_name in &file_names {
            let path = song_dir.join(file_name);
            let stat = match fs::metadata(&path) {
                Ok(stat) if stat.is_file() => stat,
                _ => {
                    self.delete_file(song_id, file_name).await?;
                    continue;
                }
            };
            let size = stat.len() as i64;
            let mtime_ns = utils::mtime_ns(&stat);

            let existing =
                sqlx::query("SELECT size, mtime_ns, md5 FROM files WHERE song_id = ? AND file_name = ?;")
                    .bind(song_id)
                    .bind(file_name)
                    .fetch_optional(&self.pool)
                    .await?;
            if let Some(row) = &existing {
                if row.try_get::<i64, _>("size")? == size
                    && row.try_get::<i64, _>("mtime_ns")? == mtime_ns
                {
                    let stored_md5: Option<String> = row.try_get("md5")?;
                    if self.pre_calculate_hashes && stored_md5.is_none() {
                        match utils::file_md5(&path) {
                            Ok(hash) => {
                                sqlx::query(
                                    "UPDATE files SET md5 = ?, last_seen = ? WHERE song_id = ? AND file_name = ?;",
                                )
                                .bind(hash)
                                .bind(now)
                                .bind(song_id)
                                .bind(file_name)
                                .execute(&self.pool)
                                .await?;
                            }
                            Err(_) => {
                                self.delete_file(song_id, file_name).await?;
                            }
                        }
                    } else {
                        sqlx::query(
                            "UPDATE files SET last_seen = ? WHERE song_id = ? AND file_name = ?;",
                        )
                        .bind(now)
                        .bind(song_id)
                        .bind(file_name)
                        .execute(&self.pool)
                        .await?;
                    }
                    continue;
                }
            }

            let md5_value = if self.pre_calculate_hashes {
                match utils::file_md5(&path) {
                    Ok(hash) => Some(hash),
                    Err(_) => {
                        // Vanished mid-read: no row, no hash.
                        self.delete_file(song_id, file_name).await?;
                        continue;
                    }
                }
            } else {
                None
            };
            sqlx::query(
                "INSERT OR REPLACE INTO files(song_id, file_name, size, mtime_ns, md5, last_seen)
                 VALUES(?,?,?,?,?,?);",
            )
            .bind(song_id)
            .bind(file_name)
            .bind(size)
            .bind(mtime_ns)
            .bind(md5_value)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Walk the whole tree and drop rows for songs no longer on disk.
    ///
    /// An absent or empty root empties both tables.
    pub async fn sync_all(&self, songlist: &SonglistData) -> ArcResult<()> {
        self.ensure_schema().await?;

        let mut song_ids = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.song_folder) {
            for entry in entries.flatten() {
                if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    if name != "." && name != ".." {
                        song_ids.push(name.to_string());
                    }
                }
            }
        }

        if song_ids.is_empty() {
            sqlx::query("DELETE FROM songs;").execute(&self.pool).await?;
            sqlx::query("DELETE FROM files;").execute(&self.pool).await?;
            return Ok(());
        }

        for song_id in &song_ids {
            let dir_mtime_ns = match fs::metadata(self.song_dir(song_id)) {
                Ok(meta) => utils::mtime_ns(&meta),
                Err(_) => continue,
            };
            self.sync_song(songlist, song_id, Some(dir_mtime_ns)).await?;
        }

        let placeholders = vec!["?"; song_ids.len()].join(",");
        for table in ["songs", "files"] {
            let sql = format!("DELETE FROM {table} WHERE song_id NOT IN ({placeholders});");
            let mut query = sqlx::query(&sql);
            for song_id in &song_ids {
                query = query.bind(song_id);
            }
            query.execute(&self.pool).await?;
        }

        log::info!("song cache synced, {} song directories", song_ids.len());
        Ok(())
    }

    /// All known song ids, sorted ascending.
    ///
    /// A `root_mtime_ns` that differs from the cached one triggers a full
    /// resync first.
    pub async fn get_all_song_ids(
        &self,
        songlist: &SonglistData,
        root_mtime_ns: i64,
    ) -> ArcResult<Vec<String>> {
        self.ensure_schema().await?;

        let stored: Option<i64> =
            sqlx::query("SELECT value FROM meta WHERE key = 'root_mtime_ns';")
                .fetch_optional(&self.pool)
                .await?
                .and_then(|row| row.try_get::<String, _>(0).ok())
                .and_then(|value| value.parse().ok());
        if stored != Some(root_mtime_ns) {
            self.sync_all(songlist).await?;
            sqlx::query("INSERT OR REPLACE INTO meta(key, value) VALUES('root_mtime_ns', ?);")
                .bind(root_mtime_ns.to_string())
                .execute(&self.pool)
                .await?;
        }

        let rows = sqlx::query("SELECT song_id FROM songs ORDER BY song_id;")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| row.try_get::<String, _>(0).map_err(Into::into))
            .collect()
    }

    /// Legal file names for one song, sorted ascending.
    ///
    /// A `dir_mtime_ns` that differs from the stored one resyncs the song
    /// first.
    pub async fn get_song_file_names(
        &self,
        songlist: &SonglistData,
        song_id: &str,
        dir_mtime_ns: i64,
    ) -> ArcResult<Vec<String>> {
        self.ensure_schema().await?;

        let stored = sqlx::query("SELECT dir_mtime_ns FROM songs WHERE song_id = ?;")
            .bind(song_id)
            .fetch_optional(&self.pool)
            .await?;
        let up_to_date = match &stored {
            Some(row) => row.try_get::<i64, _>(0)? == dir_mtime_ns,
            None => false,
        };
        if !up_to_date {
            self.sync_song(songlist, song_id, Some(dir_mtime_ns)).await?;
        }

        let rows = sqlx::query("SELECT file_name FROM files WHERE song_id = ? ORDER BY file_name;")
            .bind(song_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| row.try_get::<String, _>(0).map_err(Into::into))
            .collect()
    }

    /// Content hash for one file, recomputed only when `(size, mtime_ns)`
    /// moved since the stored hash was taken.
    ///
    /// `None` means the file is gone (and its row has been pruned).
    pub async fn get_song_file_md5(
        &self,
        song_id: &str,
        file_name: &str,
        file_mtime_ns: i64,
        file_size: i64,
    ) -> ArcResult<Option<String>> {
        self.ensure_schema().await?;

        let path = self.song_dir(song_id).join(file_name);
        if !path.is_file() {
            self.delete_file(song_id, file_name).await?;
            return Ok(None);
        }

        let now = utils::current_timestamp();
        let stored =
            sqlx::query("SELECT size, mtime_ns, md5 FROM files WHERE song_id = ? AND file_name = ?;")
                .bind(song_id)
                .bind(file_name)
                .fetch_optional(&self.pool)
                .await?;
        if let Some(row) = &stored {
            let stored_md5: Option<String> = row.try_get("md5")?;
            if row.try_get::<i64, _>("size")? == file_size
                && row.try_get::<i64, _>("mtime_ns")? == file_mtime_ns
            {
                if let Some(hash) = stored_md5 {
                    sqlx::query(
                        "UPDATE files SET last_seen = ? WHERE song_id = ? AND file_name = ?;",
                    )
                    .bind(now)
                    .bind(song_id)
                    .bind(file_name)
                    .execute(&self.pool)
                    .await?;
                    return Ok(Some(hash));
                }
            }
        }

        let hash = match utils::file_md5(&path) {
            Ok(hash) => hash,
            Err(_) => {
                self.delete_file(song_id, file_name).await?;
                return Ok(None);
            }
        };
        sqlx::query(
            "INSERT OR REPLACE INTO files(song_id, file_name, size, mtime_ns, md5, last_seen)
             VALUES(?,?,?,?,?,?);",
        )
        .bind(song_id)
        .bind(file_name)
        .bind(file_size)
        .bind(file_mtime_ns)
        .bind(&hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        // Hash lookups can precede any directory sync; make sure the song
        // row exists so the files/songs invariant holds.
        if let Ok(meta) = fs::metadata(self.song_dir(song_id)) {
            sqlx::query("INSERT OR IGNORE INTO songs(song_id, dir_mtime_ns, last_scan) VALUES(?,?,?);")
                .bind(song_id)
                .bind(utils::mtime_ns(&meta))
                .bind(now)
                .execute(&self.pool)
                .await?;
        }

        Ok(Some(hash))
    }
}
