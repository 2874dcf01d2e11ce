//! Port for the remote playback service.
//!
//! Every call is attempted exactly once. Failures are surfaced unchanged to the
//! caller; nothing here retries or caches.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    account::{PlaybackDevice, Playlist, UserProfile},
    track::{SearchQuery, TrackSummary},
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("playback transport failed: {0}")]
    Transport(String),
    #[error("playback api rejected the access token")]
    Unauthorized,
    #[error("playback api returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode playback api response: {0}")]
    Decode(String),
    #[error("invalid playback request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait PlaybackApi: Send + Sync {
    async fn play(&self) -> Result<(), PlaybackError>;
    async fn pause(&self) -> Result<(), PlaybackError>;
    async fn skip_next(&self) -> Result<(), PlaybackError>;
    async fn skip_previous(&self) -> Result<(), PlaybackError>;
    async fn set_volume(&self, percent: u8) -> Result<(), PlaybackError>;

    /// `None` when nothing is playing on the account.
    async fn current_track(&self) -> Result<Option<TrackSummary>, PlaybackError>;
    async fn playback_device(&self) -> Result<Option<PlaybackDevice>, PlaybackError>;

    async fn search_tracks(&self, query: &SearchQuery) -> Result<Vec<TrackSummary>, PlaybackError>;
    async fn track_details(&self, track_id: &str) -> Result<TrackSummary, PlaybackError>;

    async fn add_track_to_playlist(
        &self,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<(), PlaybackError>;
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<TrackSummary>, PlaybackError>;
    async fn remove_track_from_playlist(
        &self,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<(), PlaybackError>;

    async fn current_user(&self) -> Result<UserProfile, PlaybackError>;
    async fn user_playlists(&self, user_id: &str) -> Result<Vec<Playlist>, PlaybackError>;
}
