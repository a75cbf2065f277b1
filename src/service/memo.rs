//! In-memory memoizers over the metadata cache
//!
//! Three small LRUs sit in front of [`super::song_cache::SongFileCache`].
//! Their keys embed the natural change witnesses (`root_mtime_ns`,
//! `dir_mtime_ns`, `(file_mtime_ns, file_size)`), so an on-disk change
//! always lands on a fresh key and stale entries simply age out. None of
//! these sit in hot loops; a plain mutex around each map is enough. The
//! locks are never held across an await.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

const MD5_CACHE_SIZE: usize = 8192;
const FILE_NAMES_CACHE_SIZE: usize = 2048;

/// `(song_id, file_name, file_mtime_ns, file_size)`
pub type Md5Key = (String, String, i64, i64);

/// Memoizers for the download path
pub struct DownloadMemo {
    md5: Mutex<LruCache<Md5Key, Option<String>>>,
    file_names: Mutex<LruCache<(String, i64), Vec<String>>>,
    song_ids: Mutex<LruCache<i64, Vec<String>>>,
}

impl Default for DownloadMemo {
    fn default() -> Self {
        Self {
            md5: Mutex::new(LruCache::new(NonZeroUsize::new(MD5_CACHE_SIZE).unwrap())),
            file_names: Mutex::new(LruCache::new(
                NonZeroUsize::new(FILE_NAMES_CACHE_SIZE).unwrap(),
            )),
            // One slot: only the current root_mtime_ns matters.
            song_ids: Mutex::new(LruCache::new(NonZeroUsize::new(1).unwrap())),
        }
    }
}

impl DownloadMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_md5(&self, key: &Md5Key) -> Option<Option<String>> {
        self.md5.lock().unwrap().get(key).cloned()
    }

    pub fn put_md5(&self, key: Md5Key, value: Option<String>) {
        self.md5.lock().unwrap().put(key, value);
    }

    pub fn get_file_names(&self, song_id: &str, dir_mtime_ns: i64) -> Option<Vec<String>> {
        self.file_names
            .lock()
            .unwrap()
            .get(&(song_id.to_string(), dir_mtime_ns))
            .cloned()
    }

    pub fn put_file_names(&self, song_id: String, dir_mtime_ns: i64, names: Vec<String>) {
        self.file_names
            .lock()
            .unwrap()
            .put((song_id, dir_mtime_ns), names);
    }

    pub fn get_song_ids(&self, root_mtime_ns: i64) -> Option<Vec<String>> {
        self.song_ids.lock().unwrap().get(&root_mtime_ns).cloned()
    }

    pub fn put_song_ids(&self, root_mtime_ns: i64, ids: Vec<String>) {
        self.song_ids.lock().unwrap().put(root_mtime_ns, ids);
    }

    /// Empty all three caches
    pub fn clear(&self) {
        self.md5.lock().unwrap().clear();
        self.file_names.lock().unwrap().clear();
        self.song_ids.lock().unwrap().clear();
    }
}
