use async_trait::async_trait;
use jukebot_core::{CurrentTrack, TrackSummary};
use thiserror::Error;

pub const SEARCH_USAGE: &str =
    "Search should be in the format: `@bot search Artist: Someone, Track: Some Track`";
pub const NOW_PLAYING_FAILED: &str = "Unable to get currently playing track.";
pub const NOTHING_PLAYING: &str = "Nothing is currently playing.";
pub const MISSING_TRACK_ID: &str = "Missing TrackID in add command";
pub const MISSING_BAN_ARTIST: &str = "Missing artist name in ban command";
pub const SONG_ADDED: &str = "Song successfully added";
pub const NOT_AUTHENTICATED: &str = "Spotify login has not completed yet. Try again shortly.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PostError {
    #[error("chat.postMessage request failed: {0}")]
    Transport(String),
    #[error("chat.postMessage returned error `{0}`")]
    Api(String),
}

/// Outbound side of the chat connection. Messages are plain text, posted as the bot user.
#[async_trait]
pub trait MessagePoster: Send + Sync {
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), PostError>;
}

pub fn now_playing(track: &CurrentTrack) -> String {
    format!("Artist: {}\nTrack: {}\nAlbum: {}", track.artist, track.track, track.album)
}

pub fn missing_search_parameter(parameter: &str) -> String {
    format!("Missing parameter {parameter} in search command\n{SEARCH_USAGE}")
}

pub fn no_search_results(artist: &str, track: &str) -> String {
    format!("No results found for Artist: {artist} and Track: {track}")
}

/// One block per match, concatenated in result order.
pub fn search_results(tracks: &[TrackSummary]) -> String {
    tracks
        .iter()
        .map(|track| {
            format!(
                "\nTrack Title: {}\nArtist: {}\nAlbum: {}\nTrack ID: {}\n",
                track.name,
                track.primary_artist(),
                track.album,
                track.id
            )
        })
        .collect()
}

pub fn track_lookup_failed(track_id: &str) -> String {
    format!("Unable to get track details for TrackID: {track_id}")
}

pub fn track_banned(track_id: &str, banned_artist: &str) -> String {
    format!("Unable to add TrackID: {track_id} as artist {banned_artist} has been banned")
}

pub fn playlist_missing(playlist_name: &str) -> String {
    format!("Unable to find playlist {playlist_name} for the authenticated user")
}

pub fn add_failed(track_id: &str) -> String {
    format!("Unable to add TrackID: {track_id} to playlist")
}

pub fn removal_failed(artist: &str) -> String {
    format!("Unable to remove tracks by artist {artist} from playlist")
}

pub fn artist_banned(artist: &str, previous: Option<&str>) -> String {
    match previous {
        Some(previous) => format!(
            "Artist {artist} banned to overwrite artist {previous} and all tracks removed from playlist"
        ),
        None => format!("Artist {artist} banned and all tracks removed from playlist"),
    }
}
