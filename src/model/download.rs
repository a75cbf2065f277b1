use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Download token row for temporary download links
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DownloadToken {
    pub user_id: i32,
    pub song_id: String,
    pub file_name: String,
    pub token: String,
    pub time: i64,
}

/// One downloadable file inside a manifest entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Audio section of a manifest entry
///
/// The rating-class-3 override lands under the literal key `"3"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadAudio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "3", skip_serializing_if = "Option::is_none")]
    pub rating_class_3: Option<DownloadFile>,
}

/// Per-song manifest entry
///
/// Charts are keyed by the leading digit of the `.aff` file name; the map
/// is ordered so serialization is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadSong {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<DownloadAudio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<BTreeMap<String, DownloadFile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_files: Option<Vec<DownloadFile>>,
}
