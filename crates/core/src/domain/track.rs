use serde::{Deserialize, Serialize};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
}

impl TrackSummary {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or(UNKNOWN_ARTIST)
    }

    /// Case-insensitive substring match of `needle` against every listed artist.
    pub fn has_artist_matching(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.artists.iter().any(|artist| artist.to_lowercase().contains(&needle))
    }
}

/// The now-playing view: always the first listed artist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentTrack {
    pub artist: String,
    pub track: String,
    pub album: String,
}

impl From<&TrackSummary> for CurrentTrack {
    fn from(summary: &TrackSummary) -> Self {
        Self {
            artist: summary.primary_artist().to_owned(),
            track: summary.name.clone(),
            album: summary.album.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub artist: String,
    pub track: String,
}

impl SearchQuery {
    pub fn new(artist: impl Into<String>, track: impl Into<String>) -> Self {
        Self { artist: artist.into(), track: track.into() }
    }

    pub fn query_string(&self) -> String {
        format!("artist:{} track:{}", self.artist, self.track)
    }
}
