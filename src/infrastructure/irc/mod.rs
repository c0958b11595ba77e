//! Twitch Messaging Interface client.
//!
//! Anonymous (justinfan) read-only TMI client over plain TCP. The task
//! emits typed events; reconnect policy lives with the controller.

mod client;
mod codec;
mod error;
mod events;
mod state;

pub use client::{
    ANONYMOUS_PASS, CONNECT_TIMEOUT, IrcClient, IrcConfig, JOIN_TIMEOUT, KEEPALIVE_IDLE, TMI_HOST,
    TMI_PORT, connect,
};
pub use codec::{IrcLine, nick_from_prefix, parse_line, unescape_tag_value};
pub use error::{IrcError, IrcResult};
pub use events::IrcEvent;
pub use state::IrcState;
