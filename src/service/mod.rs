pub mod asset_manager;
pub mod download;
pub mod limiter;
pub mod memo;
pub mod song_cache;
pub mod songlist;

// Re-export commonly used service types for convenience
pub use asset_manager::AssetManager;
pub use download::{DownloadService, UserDownload};
pub use limiter::ArcLimiter;
pub use memo::DownloadMemo;
pub use song_cache::SongFileCache;
pub use songlist::{SonglistData, FILE_NAMES};
