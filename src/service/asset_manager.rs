//! Asset manager: composition root for song files and catalogue state
//!
//! Owns the persistent metadata cache, the in-memory memoizers and the
//! published songlist snapshot. Request code goes through the
//! stat-then-memoize entry points here; the snapshot is only ever replaced
//! whole, during `initialize_cache` and `clear_all_cache`, so readers see
//! a consistent catalogue for the duration of a request.

use crate::config::Constants;
use crate::error::ArcResult;
use crate::model::UserInfo;
use crate::service::memo::DownloadMemo;
use crate::service::song_cache::SongFileCache;
use crate::service::songlist::SonglistData;
use crate::utils;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Composition of cache, memoizers and catalogue snapshot
pub struct AssetManager {
    song_folder: PathBuf,
    songlist_path: PathBuf,
    cache: SongFileCache,
    memo: DownloadMemo,
    songlist: RwLock<Arc<SonglistData>>,
    free_pack_name: String,
    single_pack_name: String,
}

impl AssetManager {
    pub fn new(
        song_folder: impl Into<PathBuf>,
        songlist_path: impl Into<PathBuf>,
        cache: SongFileCache,
    ) -> Self {
        Self {
            song_folder: song_folder.into(),
            songlist_path: songlist_path.into(),
            cache,
            memo: DownloadMemo::new(),
            songlist: RwLock::new(Arc::new(SonglistData::default())),
            free_pack_name: Constants::FREE_PACK_NAME.to_string(),
            single_pack_name: Constants::SINGLE_PACK_NAME.to_string(),
        }
    }

    /// Override the reserved pack identifiers
    pub fn with_pack_names(mut self, free: impl Into<String>, single: impl Into<String>) -> Self {
        self.free_pack_name = free.into();
        self.single_pack_name = single.into();
        self
    }

    /// Current catalogue snapshot; cheap to take, valid for the request
    pub fn snapshot(&self) -> Arc<SonglistData> {
        self.songlist.read().unwrap().clone()
    }

    /// Parse the songlist, publish the snapshot and warm the metadata
    /// cache end-to-end.
    pub async fn initialize_cache(&self) -> ArcResult<()> {
        log::info!("initializing song asset cache");
        let data = SonglistData::load(&self.songlist_path, &self.free_pack_name);
        *self.songlist.write().unwrap() = Arc::new(data);

        self.cache.ensure_schema().await?;
        let snapshot = self.snapshot();
        self.cache.sync_all(&snapshot).await?;
        log::info!("song asset cache initialized");
        Ok(())
    }

    /// Drop the memoizers and the catalogue snapshot
    pub fn clear_all_cache(&self) {
        self.memo.clear();
        *self.songlist.write().unwrap() = Arc::new(SonglistData::default());
        log::info!("song asset caches cleared");
    }

    /// Clear then re-initialize
    pub async fn reload_cache(&self) -> ArcResult<()> {
        self.clear_all_cache();
        self.initialize_cache().await
    }

    pub fn has_songlist(&self) -> bool {
        self.snapshot().has_songlist
    }

    pub fn is_available_file(&self, song_id: &str, file_name: &str) -> bool {
        self.snapshot().is_available_file(song_id, file_name)
    }

    pub fn get_user_unlocks(&self, user: Option<&UserInfo>) -> HashSet<String> {
        self.snapshot().get_user_unlocks(user, &self.single_pack_name)
    }

    pub fn song_dir_exists(&self, song_id: &str) -> bool {
        self.song_folder.join(song_id).is_dir()
    }

    /// All song ids currently on disk, sorted ascending
    pub async fn get_all_song_ids(&self) -> ArcResult<Vec<String>> {
        let root_meta = match fs::metadata(&self.song_folder) {
            Ok(meta) if meta.is_dir() => meta,
            _ => return Ok(Vec::new()),
        };
        let root_mtime_ns = utils::mtime_ns(&root_meta);

        if let Some(ids) = self.memo.get_song_ids(root_mtime_ns) {
            return Ok(ids);
        }
        let snapshot = self.snapshot();
        let ids = self.cache.get_all_song_ids(&snapshot, root_mtime_ns).await?;
        self.memo.put_song_ids(root_mtime_ns, ids.clone());
        Ok(ids)
    }

    /// Legal files of one song, sorted ascending; a missing directory
    /// prunes the song and yields an empty list.
    pub async fn get_one_song_file_names(&self, song_id: &str) -> ArcResult<Vec<String>> {
        let dir_meta = match fs::metadata(self.song_folder.join(song_id)) {
            Ok(meta) if meta.is_dir() => meta,
            _ => {
                self.cache.delete_song(song_id).await?;
                return Ok(Vec::new());
            }
        };
        let dir_mtime_ns = utils::mtime_ns(&dir_meta);

        if let Some(names) = self.memo.get_file_names(song_id, dir_mtime_ns) {
            return Ok(names);
        }
        let snapshot = self.snapshot();
        let names = self
            .cache
            .get_song_file_names(&snapshot, song_id, dir_mtime_ns)
            .await?;
        self.memo
            .put_file_names(song_id.to_string(), dir_mtime_ns, names.clone());
        Ok(names)
    }

    /// Content hash of one file; a missing file prunes the row and yields
    /// `None`.
    pub async fn get_song_file_md5(
        &self,
        song_id: &str,
        file_name: &str,
    ) -> ArcResult<Option<String>> {
        let path = self.song_folder.join(song_id).join(file_name);
        let stat = match fs::metadata(&path) {
            Ok(stat) if stat.is_file() => stat,
            _ => {
                self.cache.delete_file(song_id, file_name).await?;
                return Ok(None);
            }
        };
        let key = (
            song_id.to_string(),
            file_name.to_string(),
            utils::mtime_ns(&stat),
            stat.len() as i64,
        );

        if let Some(hit) = self.memo.get_md5(&key) {
            return Ok(hit);
        }
        let value = self
            .cache
            .get_song_file_md5(song_id, file_name, key.2, key.3)
            .await?;
        self.memo.put_md5(key, value.clone());
        Ok(value)
    }
}
