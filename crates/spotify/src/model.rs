use jukebot_core::{PlaybackDevice, Playlist, TrackSummary, UserProfile};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize)]
pub struct ArtistObject {
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AlbumObject {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackObject {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    #[serde(default)]
    pub album: Option<AlbumObject>,
}

impl TrackObject {
    /// Local files and some episodes carry no id; they are dropped.
    pub fn into_summary(self) -> Option<TrackSummary> {
        let id = self.id?;
        Some(TrackSummary {
            id,
            name: self.name,
            artists: self.artists.into_iter().map(|artist| artist.name).collect(),
            album: self.album.map(|album| album.name).unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: Option<Paging<TrackObject>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CurrentlyPlaying {
    pub item: Option<TrackObject>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlaylistTrackItem {
    pub track: Option<TrackObject>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlaylistObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl From<PlaylistObject> for Playlist {
    fn from(value: PlaylistObject) -> Self {
        Self { id: value.id, name: value.name }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserObject {
    pub id: String,
    pub display_name: Option<String>,
}

impl From<UserObject> for UserProfile {
    fn from(value: UserObject) -> Self {
        Self { id: value.id, display_name: value.display_name }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DeviceObject {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlayerState {
    pub device: Option<DeviceObject>,
}

impl From<DeviceObject> for PlaybackDevice {
    fn from(value: DeviceObject) -> Self {
        Self { name: value.name, kind: value.kind }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AddTracksRequest {
    pub uris: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RemoveTracksRequest {
    pub tracks: Vec<TrackUri>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrackUri {
    pub uri: String,
}

pub fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{track_id}")
}
