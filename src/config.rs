use lazy_static::lazy_static;
use std::env;
use std::path::{Path, PathBuf};

/// Server configuration for the download subsystem
///
/// Every field can be overridden through the environment variable of the
/// same (upper-cased) name; `.env` files are honored via `dotenv`.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    // Storage paths
    pub sqlite_database_path: String,
    pub song_file_folder_path: String,
    pub songlist_file_path: String,

    // Cache behavior
    pub song_file_hash_pre_calculate: bool,

    // Download settings
    pub download_times_limit: u32,
    pub download_time_gap_limit: i64,
    pub download_link_prefix: String,
    pub download_forbid_when_no_item: bool,

    // Pack identifiers with reserved meaning in the catalogue
    pub free_pack_name: String,
    pub single_pack_name: String,

    // Base used for absolute download URLs when no prefix is configured
    pub server_url_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,

            sqlite_database_path: "./database/core.db".to_string(),
            song_file_folder_path: "./database/songs/".to_string(),
            songlist_file_path: "./database/songs/songlist".to_string(),

            song_file_hash_pre_calculate: true,

            download_times_limit: 3000,
            download_time_gap_limit: 1000,
            download_link_prefix: String::new(),
            download_forbid_when_no_item: false,

            free_pack_name: Constants::FREE_PACK_NAME.to_string(),
            single_pack_name: Constants::SINGLE_PACK_NAME.to_string(),

            server_url_base: "http://localhost".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut config = Self::default();
        env_string("HOST", &mut config.host);
        env_parse("PORT", &mut config.port);
        env_string("SQLITE_DATABASE_PATH", &mut config.sqlite_database_path);
        env_string("SONG_FILE_FOLDER_PATH", &mut config.song_file_folder_path);
        env_string("SONGLIST_FILE_PATH", &mut config.songlist_file_path);
        env_bool(
            "SONG_FILE_HASH_PRE_CALCULATE",
            &mut config.song_file_hash_pre_calculate,
        );
        env_parse("DOWNLOAD_TIMES_LIMIT", &mut config.download_times_limit);
        env_parse(
            "DOWNLOAD_TIME_GAP_LIMIT",
            &mut config.download_time_gap_limit,
        );
        env_string("DOWNLOAD_LINK_PREFIX", &mut config.download_link_prefix);
        env_bool(
            "DOWNLOAD_FORBID_WHEN_NO_ITEM",
            &mut config.download_forbid_when_no_item,
        );
        env_string("FREE_PACK_NAME", &mut config.free_pack_name);
        env_string("SINGLE_PACK_NAME", &mut config.single_pack_name);
        env_string("SERVER_URL_BASE", &mut config.server_url_base);
        config
    }

    /// The configured static link prefix, `None` when unset
    pub fn download_link_prefix(&self) -> Option<&str> {
        if self.download_link_prefix.is_empty() {
            None
        } else {
            Some(&self.download_link_prefix)
        }
    }

    /// The metadata cache lives next to the primary database file
    pub fn song_cache_db_path(&self) -> PathBuf {
        let parent = Path::new(&self.sqlite_database_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        parent.join(Constants::SONG_CACHE_DB_NAME)
    }
}

fn env_string(key: &str, slot: &mut String) {
    if let Ok(value) = env::var(key) {
        *slot = value;
    }
}

fn env_bool(key: &str, slot: &mut bool) {
    if let Ok(value) = env::var(key) {
        *slot = matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        );
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(value) = env::var(key) {
        if let Ok(parsed) = value.parse() {
            *slot = parsed;
        }
    }
}

/// Fixed constants
pub struct Constants;

impl Constants {
    /// Pack whose songs are free for every user
    pub const FREE_PACK_NAME: &'static str = "base";

    /// Pseudo-pack holding individually purchasable songs
    pub const SINGLE_PACK_NAME: &'static str = "single";

    /// File name of the derived metadata cache database
    pub const SONG_CACHE_DB_NAME: &'static str = "song_cache.db";
}

lazy_static! {
    /// Global configuration instance
    pub static ref CONFIG: Config = Config::from_env();
}
