use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackDevice {
    pub name: String,
    pub kind: String,
}

/// Exact name match, first hit wins.
pub fn find_playlist_by_name<'a>(playlists: &'a [Playlist], name: &str) -> Option<&'a Playlist> {
    playlists.iter().find(|playlist| playlist.name == name)
}
