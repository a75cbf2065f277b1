//! Song-asset cache initialization binary
//!
//! Creates the primary database (with the `download_token` table), parses
//! the songlist and walks the whole song tree into `song_cache.db`. Run it
//! once after deploying new song content so the first player request does
//! not pay for the full scan.

use std::process;
use std::sync::Arc;

use arc_asset_server::service::{AssetManager, DownloadService, SongFileCache};
use arc_asset_server::{Database, CONFIG};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    log::info!("song asset cache initialization");
    log::info!("song folder: {}", CONFIG.song_file_folder_path);
    log::info!("songlist:    {}", CONFIG.songlist_file_path);

    let pool = match Database::init(&CONFIG.sqlite_database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("failed to open primary database: {e}");
            process::exit(1);
        }
    };

    let cache = match SongFileCache::open(
        &CONFIG.song_cache_db_path(),
        &CONFIG.song_file_folder_path,
        CONFIG.song_file_hash_pre_calculate,
    )
    .await
    {
        Ok(cache) => cache,
        Err(e) => {
            log::error!("failed to open song cache database: {e}");
            process::exit(1);
        }
    };

    let asset_manager = Arc::new(
        AssetManager::new(
            &CONFIG.song_file_folder_path,
            &CONFIG.songlist_file_path,
            cache,
        )
        .with_pack_names(CONFIG.free_pack_name.as_str(), CONFIG.single_pack_name.as_str()),
    );
    let service = DownloadService::from_config(pool, asset_manager, &CONFIG);

    if let Err(e) = service.initialize_cache().await {
        log::error!("cache initialization failed: {e}");
        process::exit(1);
    }

    match service.asset_manager().get_all_song_ids().await {
        Ok(ids) => log::info!("cache warm, {} songs indexed", ids.len()),
        Err(e) => {
            log::error!("cache verification failed: {e}");
            process::exit(1);
        }
    }
}
