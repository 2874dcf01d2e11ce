pub mod config;
pub mod domain;
pub mod playback;
pub mod registry;
pub mod session;

pub use domain::account::{PlaybackDevice, Playlist, UserProfile};
pub use domain::track::{CurrentTrack, SearchQuery, TrackSummary};
pub use playback::{PlaybackApi, PlaybackError};
pub use registry::BannedArtistRegistry;
pub use session::{PlaybackSession, SessionError, SessionSlot};
