pub mod download;
pub mod user;

// Re-export commonly used types for convenience
pub use download::{DownloadAudio, DownloadFile, DownloadSong, DownloadToken};
pub use user::UserInfo;
