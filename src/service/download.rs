//! Download service: token issuance and per-user manifest building
//!
//! Composes the asset manager, the rate limiter and the primary-database
//! `download_token` table into the manifest the client expects. Tokens are
//! opaque, single-use-per-file and time-limited; a request that asks for
//! URLs prunes expired rows and batch-persists its fresh tokens in one
//! transaction.

use crate::config::Config;
use crate::error::{ArcError, ArcResult};
use crate::model::download::{DownloadFile, DownloadSong, DownloadToken};
use crate::model::UserInfo;
use crate::service::asset_manager::AssetManager;
use crate::service::limiter::ArcLimiter;
use crate::utils;
use base64::Engine as _;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One issued download authorization, pending batch insert
#[derive(Debug, Clone)]
pub struct UserDownload {
    pub user_id: i32,
    pub song_id: String,
    pub file_name: String,
    pub token: String,
    pub token_time: i64,
}

/// Download service over the primary database and the asset manager
pub struct DownloadService {
    pool: SqlitePool,
    asset_manager: Arc<AssetManager>,
    limiter: ArcLimiter,
    download_link_prefix: Option<String>,
    server_url_base: String,
    download_time_gap_limit: i64,
    forbid_when_no_item: bool,
}

impl DownloadService {
    pub fn new(
        pool: SqlitePool,
        asset_manager: Arc<AssetManager>,
        download_link_prefix: Option<String>,
        download_time_gap_limit: i64,
        download_times_limit: u32,
    ) -> Self {
        Self {
            pool,
            asset_manager,
            limiter: ArcLimiter::per_day(download_times_limit, "download"),
            download_link_prefix,
            server_url_base: "http://localhost".to_string(),
            download_time_gap_limit,
            forbid_when_no_item: false,
        }
    }

    /// Build a service from a loaded configuration
    pub fn from_config(pool: SqlitePool, asset_manager: Arc<AssetManager>, config: &Config) -> Self {
        Self::new(
            pool,
            asset_manager,
            config.download_link_prefix().map(str::to_string),
            config.download_time_gap_limit,
            config.download_times_limit,
        )
        .with_server_url_base(config.server_url_base.clone())
        .with_forbid_when_no_item(config.download_forbid_when_no_item)
    }

    /// Base for absolute URLs when no static prefix is configured
    pub fn with_server_url_base(mut self, base: impl Into<String>) -> Self {
        self.server_url_base = base.into();
        self
    }

    /// Restrict requested songs to the user's entitlements
    pub fn with_forbid_when_no_item(mut self, forbid: bool) -> Self {
        self.forbid_when_no_item = forbid;
        self
    }

    pub fn asset_manager(&self) -> &AssetManager {
        &self.asset_manager
    }

    /// Has the user exhausted today's download quota?
    pub fn is_limited(&self, user_id: i32) -> bool {
        !self.limiter.test(&user_id.to_string())
    }

    /// Count one download against the user's quota
    pub fn download_hit(&self, user_id: i32) -> bool {
        self.limiter.hit(&user_id.to_string())
    }

    /// Generate an opaque token and its issuance time
    pub fn generate_token(&self, user_id: i32, song_id: &str, file_name: &str) -> (String, i64) {
        let token_time = utils::current_timestamp();
        let random_bytes = rand::random::<[u8; 8]>();
        let token_data = format!(
            "{}{}{}{}{}",
            user_id,
            song_id,
            file_name,
            token_time,
            base64::engine::general_purpose::STANDARD.encode(random_bytes)
        );
        (utils::md5_hex(token_data.as_bytes()), token_time)
    }

    /// Build the download URL for an issued token
    pub fn generate_download_url(&self, song_id: &str, file_name: &str, token: &str) -> String {
        if let Some(prefix) = &self.download_link_prefix {
            let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
            format!("{prefix}/{song_id}/{file_name}?t={token}")
        } else {
            let base = self
                .server_url_base
                .strip_suffix('/')
                .unwrap_or(&self.server_url_base);
            format!("{base}/download/{song_id}/{file_name}?t={token}")
        }
    }

    /// Delete tokens older than the validity window
    pub async fn clear_expired_tokens(&self) -> ArcResult<()> {
        let cutoff = utils::current_timestamp() - self.download_time_gap_limit;
        sqlx::query("DELETE FROM download_token WHERE time < ?;")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist a batch of issued tokens in one transaction.
    ///
    /// `(user_id, song_id, file_name)` is the replace key, so repeated
    /// requests swap their old tokens in place.
    pub async fn insert_download_tokens(&self, downloads: &[UserDownload]) -> ArcResult<()> {
        if downloads.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for download in downloads {
            sqlx::query(
                "INSERT OR REPLACE INTO download_token(user_id, song_id, file_name, token, time)
                 VALUES(?,?,?,?,?);",
            )
            .bind(download.user_id)
            .bind(&download.song_id)
            .bind(&download.file_name)
            .bind(&download.token)
            .bind(download.token_time)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// A token issued at `token_time` is honored for the closed interval
    /// `[token_time, token_time + gap]`.
    fn token_valid_at(&self, token_time: i64, now: i64) -> bool {
        now - token_time <= self.download_time_gap_limit
    }

    /// Is a token issued at `token_time` still within its window?
    pub fn is_token_valid(&self, token_time: i64) -> bool {
        self.token_valid_at(token_time, utils::current_timestamp())
    }

    /// Resolve a presented token; 403 when unknown or expired.
    ///
    /// The caller still owns the quota check via [`Self::is_limited`].
    pub async fn validate_download_token(
        &self,
        song_id: &str,
        file_name: &str,
        token: &str,
    ) -> ArcResult<DownloadToken> {
        let row = sqlx::query_as::<_, DownloadToken>(
            "SELECT user_id, song_id, file_name, token, time FROM download_token
             WHERE song_id = ? AND file_name = ? AND token = ? LIMIT 1;",
        )
        .bind(song_id)
        .bind(file_name)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(record) = row else {
            return Err(ArcError::no_access(
                format!("The token `{token}` is not valid."),
                403,
            ));
        };
        if !self.token_valid_at(record.time, utils::current_timestamp()) {
            return Err(ArcError::no_access(
                format!("The token `{token}` has expired."),
                403,
            ));
        }
        Ok(record)
    }

    /// Build the manifest for one song, collecting issued tokens into
    /// `downloads` when URLs were requested.
    async fn add_one_song(
        &self,
        song_id: &str,
        user_id: i32,
        url_flag: bool,
        downloads: &mut Vec<UserDownload>,
    ) -> ArcResult<DownloadSong> {
        let mut song = DownloadSong::default();

        for file_name in self.asset_manager.get_one_song_file_names(song_id).await? {
            let checksum = self.asset_manager.get_song_file_md5(song_id, &file_name).await?;
            let url = if url_flag {
                let (token, token_time) = self.generate_token(user_id, song_id, &file_name);
                let url = self.generate_download_url(song_id, &file_name, &token);
                downloads.push(UserDownload {
                    user_id,
                    song_id: song_id.to_string(),
                    file_name: file_name.clone(),
                    token,
                    token_time,
                });
                Some(url)
            } else {
                None
            };

            match file_name.as_str() {
                "base.ogg" => {
                    let audio = song.audio.get_or_insert_with(Default::default);
                    audio.checksum = checksum;
                    audio.url = url;
                }
                "3.ogg" => {
                    let audio = song.audio.get_or_insert_with(Default::default);
                    audio.rating_class_3 = Some(DownloadFile {
                        checksum,
                        url,
                        file_name: None,
                    });
                }
                "video.mp4" | "video_audio.ogg" | "video_720.mp4" | "video_1080.mp4" => {
                    song.additional_files
                        .get_or_insert_with(Vec::new)
                        .push(DownloadFile {
                            checksum,
                            url,
                            file_name: Some(file_name.clone()),
                        });
                }
                chart_file => {
                    let difficulty = chart_file
                        .chars()
                        .next()
                        .map(|c| c.to_string())
                        .unwrap_or_default();
                    song.chart.get_or_insert_with(BTreeMap::new).insert(
                        difficulty,
                        DownloadFile {
                            checksum,
                            url,
                            file_name: None,
                        },
                    );
                }
            }
        }

        Ok(song)
    }

    /// Build the per-user manifest for `song_ids` (or everything on disk
    /// when empty), issuing and persisting tokens when `url_flag` is set.
    pub async fn generate_download_list(
        &self,
        user: &UserInfo,
        song_ids: Option<Vec<String>>,
        url_flag: bool,
    ) -> ArcResult<BTreeMap<String, DownloadSong>> {
        let has_songlist = self.asset_manager.has_songlist();
        let requested = song_ids.unwrap_or_default();

        let target: Vec<String> = if requested.is_empty() {
            let mut all = self.asset_manager.get_all_song_ids().await?;
            if self.forbid_when_no_item && has_songlist {
                let unlocks = self.asset_manager.get_user_unlocks(Some(user));
                all.retain(|id| unlocks.contains(id));
            }
            all
        } else {
            let mut ids = requested;
            if self.forbid_when_no_item && has_songlist {
                let unlocks = self.asset_manager.get_user_unlocks(Some(user));
                ids.retain(|id| unlocks.contains(id));
            }
            // Requested ids not on disk are silently omitted.
            ids.retain(|id| self.asset_manager.song_dir_exists(id));
            ids
        };

        let mut urls = BTreeMap::new();
        let mut downloads = Vec::new();
        for song_id in &target {
            let entry = self
                .add_one_song(song_id, user.user_id, url_flag, &mut downloads)
                .await?;
            urls.insert(song_id.clone(), entry);
        }

        if url_flag {
            self.clear_expired_tokens().await?;
            self.insert_download_tokens(&downloads).await?;
        }

        Ok(urls)
    }

    /// Warm the songlist snapshot and the metadata cache
    pub async fn initialize_cache(&self) -> ArcResult<()> {
        self.asset_manager.initialize_cache().await
    }

    /// Drop every in-memory song cache
    pub fn clear_all_cache(&self) {
        self.asset_manager.clear_all_cache()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::song_cache::SongFileCache;
    use crate::utils::md5_hex;
    use crate::Database;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        service: DownloadService,
    }

    async fn fixture(songlist: Option<serde_json::Value>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let songs = dir.path().join("songs");
        fs::create_dir_all(&songs).unwrap();
        let songlist_path = dir.path().join("songlist");
        if let Some(value) = songlist {
            fs::write(&songlist_path, value.to_string()).unwrap();
        }

        let pool = Database::init(dir.path().join("core.db").to_str().unwrap())
            .await
            .unwrap();
        let cache = SongFileCache::open(&dir.path().join("song_cache.db"), &songs, true)
            .await
            .unwrap();
        let asset_manager =
            Arc::new(AssetManager::new(&songs, &songlist_path, cache).with_pack_names("free", "single"));
        let service = DownloadService::new(pool, asset_manager, None, 1000, 3000);
        Fixture { dir, service }
    }

    fn put_file(fx: &Fixture, song_id: &str, file_name: &str, bytes: &[u8]) {
        let dir = fx.dir.path().join("songs").join(song_id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file_name), bytes).unwrap();
    }

    async fn token_rows(fx: &Fixture) -> Vec<DownloadToken> {
        sqlx::query_as::<_, DownloadToken>(
            "SELECT user_id, song_id, file_name, token, time FROM download_token ORDER BY song_id, file_name;",
        )
        .fetch_all(&fx.service.pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_manifest_without_catalogue() {
        let fx = fixture(None).await;
        put_file(&fx, "abc", "0.aff", b"chart zero");
        put_file(&fx, "abc", "base.ogg", b"base audio");
        fx.service.initialize_cache().await.unwrap();

        let urls = fx
            .service
            .generate_download_list(&UserInfo::new(1), None, false)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&urls).unwrap(),
            json!({"abc": {
                "chart": {"0": {"checksum": md5_hex(b"chart zero")}},
                "audio": {"checksum": md5_hex(b"base audio")}
            }})
        );
    }

    #[tokio::test]
    async fn test_catalogue_restricts_files() {
        let fx = fixture(Some(json!({"songs": [
            {"id": "abc", "set": "free", "purchase": "", "remote_dl": true,
             "difficulties": [{"ratingClass": 0}]}
        ]})))
        .await;
        put_file(&fx, "abc", "0.aff", b"chart zero");
        put_file(&fx, "abc", "1.aff", b"chart one");
        put_file(&fx, "abc", "base.ogg", b"base audio");
        fx.service.initialize_cache().await.unwrap();

        let urls = fx
            .service
            .generate_download_list(&UserInfo::new(1), None, false)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&urls).unwrap(),
            json!({"abc": {
                "chart": {"0": {"checksum": md5_hex(b"chart zero")}},
                "audio": {"checksum": md5_hex(b"base audio")}
            }})
        );
    }

    #[tokio::test]
    async fn test_rating_class_3_audio_override() {
        let fx = fixture(Some(json!({"songs": [
            {"id": "abc", "set": "free", "purchase": "", "remote_dl": true,
             "difficulties": [{"ratingClass": 3, "audioOverride": true}]}
        ]})))
        .await;
        put_file(&fx, "abc", "3.aff", b"chart byd");
        put_file(&fx, "abc", "3.ogg", b"byd audio");
        put_file(&fx, "abc", "base.ogg", b"base audio");
        fx.service.initialize_cache().await.unwrap();

        let urls = fx
            .service
            .generate_download_list(&UserInfo::new(1), None, false)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&urls).unwrap(),
            json!({"abc": {
                "chart": {"3": {"checksum": md5_hex(b"chart byd")}},
                "audio": {
                    "checksum": md5_hex(b"base audio"),
                    "3": {"checksum": md5_hex(b"byd audio")}
                }
            }})
        );
    }

    #[tokio::test]
    async fn test_remote_dl_false_serves_only_byd_chart() {
        let fx = fixture(Some(json!({"songs": [
            {"id": "abc", "set": "free", "purchase": "", "remote_dl": false,
             "difficulties": [{"ratingClass": 0}, {"ratingClass": 3}]}
        ]})))
        .await;
        put_file(&fx, "abc", "0.aff", b"chart zero");
        put_file(&fx, "abc", "3.aff", b"chart byd");
        put_file(&fx, "abc", "base.ogg", b"base audio");
        fx.service.initialize_cache().await.unwrap();

        let urls = fx
            .service
            .generate_download_list(&UserInfo::new(1), None, false)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&urls).unwrap(),
            json!({"abc": {
                "chart": {"3": {"checksum": md5_hex(b"chart byd")}}
            }})
        );
    }

    #[tokio::test]
    async fn test_additional_files_routed_to_their_section() {
        let fx = fixture(Some(json!({"songs": [
            {"id": "abc", "set": "free", "purchase": "", "remote_dl": true,
             "difficulties": [{"ratingClass": 0}],
             "additional_files": [{"file_name": "video.mp4"}]}
        ]})))
        .await;
        put_file(&fx, "abc", "0.aff", b"chart zero");
        put_file(&fx, "abc", "video.mp4", b"video bytes");
        fx.service.initialize_cache().await.unwrap();

        let urls = fx
            .service
            .generate_download_list(&UserInfo::new(1), None, false)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&urls).unwrap(),
            json!({"abc": {
                "chart": {"0": {"checksum": md5_hex(b"chart zero")}},
                "additional_files": [
                    {"checksum": md5_hex(b"video bytes"), "file_name": "video.mp4"}
                ]
            }})
        );
    }

    #[tokio::test]
    async fn test_url_flag_issues_and_persists_tokens() {
        let fx = fixture(None).await;
        put_file(&fx, "abc", "0.aff", b"chart zero");
        put_file(&fx, "abc", "base.ogg", b"base audio");
        fx.service.initialize_cache().await.unwrap();

        let urls = fx
            .service
            .generate_download_list(&UserInfo::new(7), None, true)
            .await
            .unwrap();

        let rows = token_rows(&fx).await;
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.user_id, 7);
            assert_eq!(row.token.len(), 32);
            assert!(row.token.chars().all(|c| c.is_ascii_hexdigit()));
            let validated = fx
                .service
                .validate_download_token(&row.song_id, &row.file_name, &row.token)
                .await
                .unwrap();
            assert_eq!(validated.user_id, 7);
        }

        let base_row = rows.iter().find(|r| r.file_name == "base.ogg").unwrap();
        let value = serde_json::to_value(&urls).unwrap();
        let url = value["abc"]["audio"]["url"].as_str().unwrap();
        assert_eq!(
            url,
            format!(
                "http://localhost/download/abc/base.ogg?t={}",
                base_row.token
            )
        );
    }

    #[tokio::test]
    async fn test_repeat_request_replaces_token_in_place() {
        let fx = fixture(None).await;
        put_file(&fx, "abc", "base.ogg", b"base audio");
        fx.service.initialize_cache().await.unwrap();

        fx.service
            .generate_download_list(&UserInfo::new(7), None, true)
            .await
            .unwrap();
        let first = token_rows(&fx).await;
        fx.service
            .generate_download_list(&UserInfo::new(7), None, true)
            .await
            .unwrap();
        let second = token_rows(&fx).await;

        // replaced in place, never a second row for the same file
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        fx.service
            .validate_download_token("abc", "base.ogg", &second[0].token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_token_validity_window_is_closed_interval() {
        let fx = fixture(None).await;
        let gap = fx.service.download_time_gap_limit;
        let t0 = 1_000_000;

        assert!(fx.service.token_valid_at(t0, t0));
        assert!(fx.service.token_valid_at(t0, t0 + gap));
        assert!(!fx.service.token_valid_at(t0, t0 + gap + 1));
    }

    #[tokio::test]
    async fn test_expired_token_round_trip_is_rejected() {
        let fx = fixture(None).await;
        let now = utils::current_timestamp();
        let gap = fx.service.download_time_gap_limit;

        let mk = |time: i64, token: &str| UserDownload {
            user_id: 7,
            song_id: "abc".to_string(),
            file_name: "base.ogg".to_string(),
            token: token.to_string(),
            token_time: time,
        };
        // comfortably inside the window
        fx.service
            .insert_download_tokens(&[mk(now, "fresh")])
            .await
            .unwrap();
        fx.service
            .validate_download_token("abc", "base.ogg", "fresh")
            .await
            .unwrap();

        // past the window, and only ever getting older
        fx.service
            .insert_download_tokens(&[mk(now - gap - 5, "late")])
            .await
            .unwrap();
        let err = fx
            .service
            .validate_download_token("abc", "base.ogg", "late")
            .await
            .unwrap_err();
        assert_eq!(err.status(), 403);
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn test_unknown_token_is_403() {
        let fx = fixture(None).await;
        let err = fx
            .service
            .validate_download_token("abc", "base.ogg", "nope")
            .await
            .unwrap_err();
        assert_eq!(err.status(), 403);
        assert!(err.to_string().contains("`nope`"));
    }

    #[tokio::test]
    async fn test_expired_tokens_are_pruned_before_batch_insert() {
        let fx = fixture(None).await;
        put_file(&fx, "abc", "base.ogg", b"base audio");
        fx.service.initialize_cache().await.unwrap();

        let stale = UserDownload {
            user_id: 9,
            song_id: "old".to_string(),
            file_name: "base.ogg".to_string(),
            token: "stale".to_string(),
            token_time: utils::current_timestamp() - fx.service.download_time_gap_limit - 100,
        };
        fx.service.insert_download_tokens(&[stale]).await.unwrap();
        assert_eq!(token_rows(&fx).await.len(), 1);

        fx.service
            .generate_download_list(&UserInfo::new(7), None, true)
            .await
            .unwrap();
        let rows = token_rows(&fx).await;
        assert!(rows.iter().all(|r| r.token != "stale"));
    }

    #[tokio::test]
    async fn test_forbid_when_no_item_filters_by_entitlement() {
        let fx = fixture(Some(json!({"songs": [
            {"id": "freesong", "set": "free", "purchase": "", "remote_dl": true,
             "difficulties": [{"ratingClass": 0}]},
            {"id": "packsong", "set": "pack_a", "purchase": "pack_a", "remote_dl": true,
             "difficulties": [{"ratingClass": 0}]}
        ]})))
        .await;
        put_file(&fx, "freesong", "0.aff", b"free chart");
        put_file(&fx, "packsong", "0.aff", b"pack chart");
        let service = DownloadService::new(
            fx.service.pool.clone(),
            fx.service.asset_manager.clone(),
            None,
            1000,
            3000,
        )
        .with_forbid_when_no_item(true);

        service.initialize_cache().await.unwrap();

        let urls = service
            .generate_download_list(&UserInfo::new(1), Some(vec![
                "freesong".to_string(),
                "packsong".to_string(),
            ]), false)
            .await
            .unwrap();
        assert!(urls.contains_key("freesong"));
        assert!(!urls.contains_key("packsong"));
    }

    #[tokio::test]
    async fn test_requested_song_missing_on_disk_is_omitted() {
        let fx = fixture(None).await;
        put_file(&fx, "abc", "0.aff", b"chart");
        fx.service.initialize_cache().await.unwrap();

        let urls = fx
            .service
            .generate_download_list(
                &UserInfo::new(1),
                Some(vec!["abc".to_string(), "ghost".to_string()]),
                false,
            )
            .await
            .unwrap();
        assert!(urls.contains_key("abc"));
        assert!(!urls.contains_key("ghost"));
        assert_eq!(urls.len(), 1);
    }

    #[tokio::test]
    async fn test_manifest_is_sorted_by_song_id() {
        let fx = fixture(None).await;
        put_file(&fx, "zzz", "0.aff", b"z");
        put_file(&fx, "aaa", "0.aff", b"a");
        put_file(&fx, "mmm", "0.aff", b"m");
        fx.service.initialize_cache().await.unwrap();

        let urls = fx
            .service
            .generate_download_list(&UserInfo::new(1), None, false)
            .await
            .unwrap();
        let keys: Vec<_> = urls.keys().cloned().collect();
        assert_eq!(keys, vec!["aaa", "mmm", "zzz"]);
    }

    #[tokio::test]
    async fn test_download_url_prefix_handling() {
        let fx = fixture(None).await;
        let service = DownloadService::new(
            fx.service.pool.clone(),
            fx.service.asset_manager.clone(),
            Some("https://cdn.example.com/songs".to_string()),
            1000,
            3000,
        );
        assert_eq!(
            service.generate_download_url("abc", "base.ogg", "tok"),
            "https://cdn.example.com/songs/abc/base.ogg?t=tok"
        );

        let service = DownloadService::new(
            fx.service.pool.clone(),
            fx.service.asset_manager.clone(),
            Some("https://cdn.example.com/songs/".to_string()),
            1000,
            3000,
        );
        assert_eq!(
            service.generate_download_url("abc", "base.ogg", "tok"),
            "https://cdn.example.com/songs/abc/base.ogg?t=tok"
        );

        assert_eq!(
            fx.service.generate_download_url("abc", "base.ogg", "tok"),
            "http://localhost/download/abc/base.ogg?t=tok"
        );
    }

    #[tokio::test]
    async fn test_download_quota_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let songs = dir.path().join("songs");
        fs::create_dir_all(&songs).unwrap();
        let pool = Database::init(dir.path().join("core.db").to_str().unwrap())
            .await
            .unwrap();
        let cache = SongFileCache::open(&dir.path().join("song_cache.db"), &songs, true)
            .await
            .unwrap();
        let asset_manager = Arc::new(AssetManager::new(&songs, dir.path().join("songlist"), cache));
        let service = DownloadService::new(pool, asset_manager, None, 1000, 2);

        assert!(!service.is_limited(7));
        assert!(service.download_hit(7));
        assert!(service.download_hit(7));
        assert!(!service.download_hit(7));
        assert!(service.is_limited(7));
    }

    #[tokio::test]
    async fn test_generated_tokens_are_unique_hex_md5s() {
        let fx = fixture(None).await;
        let (first, t1) = fx.service.generate_token(7, "abc", "base.ogg");
        let (second, t2) = fx.service.generate_token(7, "abc", "base.ogg");

        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        // same inputs, fresh entropy
        assert_ne!(first, second);
        assert!(t1 <= t2);
    }
}
