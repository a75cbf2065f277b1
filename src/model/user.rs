use serde::{Deserialize, Serialize};

/// Entitlement view of a user, as the download path consumes it
///
/// `packs` are bulk purchases, `singles` are individually bought songs and
/// `world_songs` are ids earned through world-map progression. The full
/// account record lives in the primary database; this struct only carries
/// what download authorization needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: i32,
    pub name: Option<String>,
    pub packs: Vec<String>,
    pub singles: Vec<String>,
    pub world_songs: Vec<String>,
}

impl UserInfo {
    pub fn new(user_id: i32) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }
}
