//! Slack integration - Socket Mode bot interface
//!
//! This crate provides the chat side of jukebot:
//! - **Socket Mode** (`socket`, `transport`) - WebSocket connection to Slack with reconnection
//! - **Events** (`events`) - Envelope decoding, dispatch, mention handling
//! - **Commands** (`commands`) - Classification of `@bot <command>` text and routing
//! - **Handlers** (`service`) - Playback commands against the authenticated Spotify session
//! - **Messages** (`messages`, `web`) - Reply texts and `chat.postMessage`
//!
//! # Architecture
//!
//! ```text
//! Slack Events → EventDispatcher → MessageHandler → CommandRouter → JukeboxService
//!                                                                      ↓
//!                                       chat.postMessage ← MessagePoster
//! ```
//!
//! Envelopes are processed one at a time: the runner waits for each dispatch
//! to finish before reading the next envelope.

pub mod commands;
pub mod events;
pub mod messages;
pub mod service;
pub mod socket;
pub mod transport;
pub mod web;
