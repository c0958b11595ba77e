//! matrix-reloaded - bridges Twitch chat to a networked LED matrix display.
//!
//! Chat messages are parsed for Twitch emotes and Unicode emojis, resolved
//! to cached PNG/GIF images and uploaded to the display's slot-bounded
//! ingest queue, with a popularity-ranked backlog absorbing bursts.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the controller and its services.
pub mod application;
/// Domain layer containing entities and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "matrix-reloaded";
