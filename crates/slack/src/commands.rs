use async_trait::async_trait;
use jukebot_core::{registry::normalize_artist, PlaybackError, SessionError};
use thiserror::Error;
use tracing::{info, warn};

use crate::messages::{self, PostError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub channel_id: String,
    pub user_id: String,
    /// Message text with the mention prefix stripped and trimmed.
    pub text: String,
    pub correlation_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackControl {
    Play,
    Pause,
    Next,
    Previous,
    Volume(u8),
}

impl PlaybackControl {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Volume(_) => "volume",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Search { text: String },
    AddTrack { track_id: String },
    Volume { argument: String },
    Ban { artist: String },
    Playback(PlaybackControl),
    NowPlaying,
    Unrecognized,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchParams {
    pub artist: String,
    pub track: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Handled,
    Ignored,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{}", messages::missing_search_parameter(.0))]
    MissingSearchParameter(&'static str),
    #[error("no results found for query `artist:{artist} track:{track}`")]
    NoResults { artist: String, track: String },
    #[error("{}", messages::MISSING_TRACK_ID)]
    MissingTrackId,
    #[error("{}", messages::MISSING_BAN_ARTIST)]
    MissingBanArtist,
    #[error("invalid volume `{0}`; expected an integer between 0 and 100")]
    InvalidVolume(String),
    #[error("unable to get track details for `{track_id}`: {source}")]
    TrackLookup { track_id: String, source: PlaybackError },
    #[error("unable to add `{track_id}` to playlist: {source}")]
    AddTrack { track_id: String, source: PlaybackError },
    #[error("unable to remove tracks by artist `{artist}`: {source}")]
    RemoveTracks { artist: String, source: PlaybackError },
    #[error("playlist `{0}` was not found for the authenticated user")]
    PlaylistNotFound(String),
    #[error("spotify login has not completed yet")]
    NotAuthenticated,
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error("failed to post reply: {0}")]
    Post(#[from] PostError),
}

impl From<SessionError> for CommandError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::PlaylistNotFound(name) => Self::PlaylistNotFound(name),
            SessionError::NotAuthenticated | SessionError::AlreadyFilled => Self::NotAuthenticated,
        }
    }
}

/// Classifies stripped message text. Checks run in a fixed order and the first match wins.
pub fn parse_bot_command(text: &str) -> BotCommand {
    let text = text.trim();

    if text.starts_with("search") {
        return BotCommand::Search { text: text.to_owned() };
    }
    if let Some(rest) = text.strip_prefix("add") {
        return BotCommand::AddTrack { track_id: rest.trim().to_owned() };
    }
    if let Some(rest) = text.strip_prefix("volume") {
        return BotCommand::Volume { argument: rest.trim().to_owned() };
    }
    if let Some(rest) = text.strip_prefix("ban") {
        return BotCommand::Ban { artist: normalize_artist(rest) };
    }

    match text.to_lowercase().as_str() {
        "play" => BotCommand::Playback(PlaybackControl::Play),
        "pause" => BotCommand::Playback(PlaybackControl::Pause),
        "next" => BotCommand::Playback(PlaybackControl::Next),
        "previous" => BotCommand::Playback(PlaybackControl::Previous),
        "now playing" => BotCommand::NowPlaying,
        _ => BotCommand::Unrecognized,
    }
}

/// Parses `search Artist: X, Track: Y` into lowercased, trimmed parameters.
///
/// Keys are case-insensitive and split on the first `:`; parts without one are skipped.
pub fn parse_search_params(text: &str) -> Result<SearchParams, CommandError> {
    let text = text.trim();
    let text = text.strip_prefix("search").unwrap_or(text);

    let mut artist = None;
    let mut track = None;
    for part in text.split(',') {
        let Some((key, value)) = part.split_once(':') else {
            continue;
        };
        let value = value.trim().to_lowercase();
        match key.trim().to_lowercase().as_str() {
            "artist" => artist = Some(value),
            "track" => track = Some(value),
            _ => {}
        }
    }

    let artist = artist.ok_or(CommandError::MissingSearchParameter("Artist"))?;
    let track = track.ok_or(CommandError::MissingSearchParameter("Track"))?;
    Ok(SearchParams { artist, track })
}

pub fn parse_volume(argument: &str) -> Result<u8, CommandError> {
    argument
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|percent| *percent <= 100)
        .ok_or_else(|| CommandError::InvalidVolume(argument.to_owned()))
}

#[async_trait]
pub trait JukeboxCommandService: Send + Sync {
    async fn now_playing(&self, envelope: &CommandEnvelope) -> Result<(), CommandError>;

    async fn search(&self, text: &str, envelope: &CommandEnvelope) -> Result<(), CommandError>;

    async fn add_track(&self, track_id: &str, envelope: &CommandEnvelope)
        -> Result<(), CommandError>;

    async fn ban_artist(&self, artist: &str, envelope: &CommandEnvelope)
        -> Result<(), CommandError>;

    async fn playback(
        &self,
        control: PlaybackControl,
        envelope: &CommandEnvelope,
    ) -> Result<(), CommandError>;
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: JukeboxCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(&self, envelope: CommandEnvelope) -> Result<CommandOutcome, CommandError> {
        let command = parse_bot_command(&envelope.text);
        info!(
            event_name = "command.received",
            correlation_id = %envelope.correlation_id,
            user_id = %envelope.user_id,
            channel_id = %envelope.channel_id,
            command = ?command,
            "routing bot command"
        );

        match command {
            BotCommand::Search { text } => self.service.search(&text, &envelope).await?,
            BotCommand::AddTrack { track_id } => self.service.add_track(&track_id, &envelope).await?,
            BotCommand::Ban { artist } => self.service.ban_artist(&artist, &envelope).await?,
            BotCommand::NowPlaying => self.service.now_playing(&envelope).await?,
            BotCommand::Volume { argument } => match parse_volume(&argument) {
                Ok(percent) => self.playback(PlaybackControl::Volume(percent), &envelope).await,
                Err(error) => {
                    warn!(
                        event_name = "command.volume.invalid",
                        correlation_id = %envelope.correlation_id,
                        error = %error,
                        "ignoring volume command"
                    );
                    return Ok(CommandOutcome::Ignored);
                }
            },
            BotCommand::Playback(control) => self.playback(control, &envelope).await,
            BotCommand::Unrecognized => return Ok(CommandOutcome::Ignored),
        }

        Ok(CommandOutcome::Handled)
    }

    /// Playback control failures are logged and never posted.
    async fn playback(&self, control: PlaybackControl, envelope: &CommandEnvelope) {
        if let Err(error) = self.service.playback(control, envelope).await {
            warn!(
                event_name = "command.playback.failed",
                correlation_id = %envelope.correlation_id,
                control = control.name(),
                error = %error,
                "playback control failed"
            );
        }
    }
}
