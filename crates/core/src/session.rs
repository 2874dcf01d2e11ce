//! One-shot handoff of the authenticated playback session.
//!
//! The authorization task fills the slot exactly once; command handlers read it
//! and get [`SessionError::NotAuthenticated`] until that happens.

use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::domain::account::{Playlist, UserProfile};
use crate::playback::PlaybackApi;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("spotify login has not completed yet")]
    NotAuthenticated,
    #[error("playback session was already handed off")]
    AlreadyFilled,
    #[error("playlist `{0}` was not found for the authenticated user")]
    PlaylistNotFound(String),
}

pub struct PlaybackSession {
    pub api: Arc<dyn PlaybackApi>,
    pub user: UserProfile,
    pub playlist: Option<Playlist>,
    pub playlist_name: String,
}

impl PlaybackSession {
    pub fn target_playlist(&self) -> Result<&Playlist, SessionError> {
        self.playlist
            .as_ref()
            .ok_or_else(|| SessionError::PlaylistNotFound(self.playlist_name.clone()))
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("user", &self.user)
            .field("playlist", &self.playlist)
            .field("playlist_name", &self.playlist_name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionSlot {
    inner: Arc<OnceLock<Arc<PlaybackSession>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(&self, session: PlaybackSession) -> Result<(), SessionError> {
        self.inner.set(Arc::new(session)).map_err(|_| SessionError::AlreadyFilled)
    }

    pub fn session(&self) -> Result<Arc<PlaybackSession>, SessionError> {
        self.inner.get().cloned().ok_or(SessionError::NotAuthenticated)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.get().is_some()
    }
}
