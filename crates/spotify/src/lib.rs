//! Spotify Web API adapter
//!
//! - **OAuth** (`oauth`) - authorization URL, state check, and code-for-token exchange
//! - **Client** (`client`) - `SpotifyClient`, the `PlaybackApi` implementation over `reqwest`
//! - **Model** (`model`) - wire types for the subset of the Web API the bot touches
//!
//! Only the first page of any paged response is read.

pub mod client;
pub mod model;
pub mod oauth;

pub use client::SpotifyClient;
pub use oauth::{AccessToken, AuthorizationRequest, OAuthError};
