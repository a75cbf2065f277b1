//! Songlist catalogue interpreter
//!
//! Parses the songlist JSON once and compiles it into a per-song bitmap of
//! downloadable file names plus the three entitlement indexes (free songs,
//! pack-to-song, world-unlock songs). The result is an immutable snapshot;
//! the asset manager republishes a fresh one on reload.

use crate::model::UserInfo;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// The eleven file names a song directory may legally serve.
///
/// Index order defines the bitmap layout: bits 0-4 are the chart files,
/// bit 5 `base.ogg`, bit 6 the rating-class-3 audio override, bits 7-10
/// the video extras.
pub const FILE_NAMES: [&str; 11] = [
    "0.aff",
    "1.aff",
    "2.aff",
    "3.aff",
    "4.aff",
    "base.ogg",
    "3.ogg",
    "video.mp4",
    "video_audio.ogg",
    "video_720.mp4",
    "video_1080.mp4",
];

/// One difficulty entry of a catalogue song
#[derive(Debug, Clone, Deserialize)]
pub struct SonglistDifficulty {
    #[serde(rename = "ratingClass")]
    pub rating_class: i32,
    #[serde(rename = "audioOverride", default)]
    pub audio_override: bool,
}

/// Extra downloadable file declared by a catalogue song
#[derive(Debug, Clone, Deserialize)]
pub struct SonglistAdditionalFile {
    pub file_name: String,
}

/// One song entry of the catalogue
///
/// `id`, `set` and `purchase` are modelled as optional because the unlock
/// pass skips entries that lack them instead of failing the whole parse.
#[derive(Debug, Clone, Deserialize)]
pub struct SonglistEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub purchase: Option<String>,
    #[serde(default)]
    pub remote_dl: bool,
    #[serde(default)]
    pub world_unlock: bool,
    #[serde(default)]
    pub difficulties: Vec<SonglistDifficulty>,
    #[serde(default)]
    pub additional_files: Vec<SonglistAdditionalFile>,
}

/// Catalogue root structure
#[derive(Debug, Clone, Deserialize)]
struct Songlist {
    #[serde(default)]
    songs: Vec<SonglistEntry>,
}

/// Compiled catalogue snapshot, read-only after parse
#[derive(Debug, Clone, Default)]
pub struct SonglistData {
    /// song_id -> bitmap over [`FILE_NAMES`]
    pub songs: HashMap<String, u16>,
    /// pack_id -> songs it contains
    pub pack_info: HashMap<String, HashSet<String>>,
    /// Songs free for everyone
    pub free_songs: HashSet<String>,
    /// World-unlock songs; a trailing `3` marks a separately unlocked
    /// rating-class-3 chart
    pub world_songs: HashSet<String>,
    /// Whether a catalogue file was successfully loaded
    pub has_songlist: bool,
}

impl SonglistData {
    /// Load and compile the catalogue at `path`.
    ///
    /// A missing file or a malformed document leaves every index empty
    /// with `has_songlist == false`: the deployment then runs unfiltered.
    pub fn load(path: &Path, free_pack_name: &str) -> Self {
        let mut data = Self::default();

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => {
                log::warn!("songlist not found at {}, downloads unfiltered", path.display());
                return data;
            }
        };
        let parsed: Songlist = match serde_json::from_slice(&bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("songlist at {} is malformed ({e}), downloads unfiltered", path.display());
                return data;
            }
        };

        data.has_songlist = true;
        for song in &parsed.songs {
            data.parse_one(song);
            data.parse_one_unlock(song, free_pack_name);
        }
        log::info!("parsed {} songs from songlist", parsed.songs.len());
        data
    }

    /// Compile one song's downloadable-file bitmap
    fn parse_one(&mut self, song: &SonglistEntry) {
        let Some(id) = song.id.as_ref() else {
            return;
        };

        let mut rule: u16 = 0;
        if song.remote_dl {
            rule |= 1 << 5;
            for difficulty in &song.difficulties {
                if difficulty.rating_class == 3 && difficulty.audio_override {
                    rule |= 1 << 6;
                }
                if (0..=4).contains(&difficulty.rating_class) {
                    rule |= 1 << difficulty.rating_class;
                }
            }
        } else {
            // A rating-class-3 chart stays downloadable even when the song
            // itself is not remotely served.
            for difficulty in &song.difficulties {
                if difficulty.rating_class == 3 {
                    rule |= 1 << 3;
                    if difficulty.audio_override {
                        rule |= 1 << 6;
                    }
                }
            }
        }

        for extra in &song.additional_files {
            if let Some(offset) = FILE_NAMES[7..]
                .iter()
                .position(|name| *name == extra.file_name)
            {
                rule |= 1 << (7 + offset);
            }
        }

        self.songs.insert(id.clone(), rule);
    }

    /// Record how one song is unlocked
    fn parse_one_unlock(&mut self, song: &SonglistEntry, free_pack_name: &str) {
        let (Some(id), Some(set), Some(purchase)) =
            (song.id.as_ref(), song.set.as_ref(), song.purchase.as_ref())
        else {
            return;
        };

        if set == free_pack_name {
            if song
                .difficulties
                .iter()
                .any(|difficulty| difficulty.rating_class == 3)
            {
                self.world_songs.insert(format!("{id}3"));
            }
            self.free_songs.insert(id.clone());
            return;
        }

        if song.world_unlock {
            self.world_songs.insert(id.clone());
        }

        if purchase.is_empty() {
            return;
        }

        self.pack_info.entry(set.clone()).or_default().insert(id.clone());
    }

    /// Whether `file_name` may be served for `song_id`.
    ///
    /// Songs absent from the catalogue fall back to the name allow-list.
    pub fn is_available_file(&self, song_id: &str, file_name: &str) -> bool {
        let Some(&rule) = self.songs.get(song_id) else {
            return FILE_NAMES.contains(&file_name);
        };
        FILE_NAMES
            .iter()
            .enumerate()
            .any(|(i, name)| *name == file_name && rule & (1 << i) != 0)
    }

    /// The set of song ids the user may download
    pub fn get_user_unlocks(&self, user: Option<&UserInfo>, single_pack_name: &str) -> HashSet<String> {
        let Some(user) = user else {
            return HashSet::new();
        };

        let mut unlocks = HashSet::new();

        for pack_id in &user.packs {
            if let Some(songs) = self.pack_info.get(pack_id) {
                unlocks.extend(songs.iter().cloned());
            }
        }

        if let Some(singles) = self.pack_info.get(single_pack_name) {
            for song_id in &user.singles {
                if singles.contains(song_id) {
                    unlocks.insert(song_id.clone());
                }
            }
        }

        for world_id in &user.world_songs {
            if self.world_songs.contains(world_id) {
                let song_id = world_id.strip_suffix('3').unwrap_or(world_id);
                unlocks.insert(song_id.to_string());
            }
        }

        unlocks.extend(self.free_songs.iter().cloned());
        unlocks
    }
}
