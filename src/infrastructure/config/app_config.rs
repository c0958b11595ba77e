//! Application configuration.

use std::collections::HashSet;

use clap::Parser;

/// Emote ids filtered out by default, merged with `--forbidden-emotes`.
pub const DEFAULT_FORBIDDEN_EMOTES: &[&str] = &[
    "MercyWing1",
    "MercyWing2",
    "PowerUpL",
    "PowerUpR",
    "Squid1",
    "Squid2",
    "Squid4",
    "DinoDance",
];

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Trace level. Exposes raw IRC line I/O.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration from CLI.
#[derive(Debug, Parser)]
#[command(
    name = "matrix-reloaded",
    version,
    about = "Bridges Twitch chat emotes and emojis to a networked LED matrix display",
    long_about = None
)]
pub struct AppConfig {
    /// Twitch channels to join at startup. Required unless --interactive.
    #[arg(value_name = "chan")]
    pub chan: Vec<String>,

    /// Hostname (host or host:port) of the LED matrix display.
    #[arg(long, value_name = "HOST")]
    pub matrix_hostname: Option<String>,

    /// Log verbosity level.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Only log warnings and errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable logging entirely.
    #[arg(short, long)]
    pub silent: bool,

    /// Additional forbidden Twitch emote ids.
    #[arg(long, value_delimiter = ',', value_name = "ID")]
    pub forbidden_emotes: Vec<String>,

    /// Chatters whose messages are ignored.
    #[arg(long, value_delimiter = ',', value_name = "NICK")]
    pub forbidden_users: Vec<String>,

    /// Emit each distinct image at most once per message.
    #[arg(short = 'u', long)]
    pub no_summation: bool,

    /// Wait for an ON command instead of starting immediately.
    #[arg(short, long)]
    pub interactive: bool,

    /// TCP port of the command interface.
    #[arg(long, value_name = "PORT")]
    pub command_port: Option<u16>,

    /// Delete the image cache directory and exit.
    #[arg(long)]
    pub purge: bool,

    /// Print license information and exit.
    #[arg(long)]
    pub license: bool,
}

impl AppConfig {
    /// Validates cross-flag constraints that clap cannot express.
    ///
    /// # Errors
    /// Returns a human-readable message; the caller exits with the argument
    /// error code.
    pub fn validate(&self) -> Result<(), String> {
        if self.interactive && self.command_port.is_none() {
            return Err("--interactive requires --command-port".to_string());
        }
        if !self.interactive && self.chan.is_empty() {
            return Err("chan is required unless --interactive is given".to_string());
        }
        if self.matrix_hostname.is_none() {
            return Err("--matrix-hostname is required".to_string());
        }
        Ok(())
    }

    /// Built-in forbidden emote ids merged with the CLI additions.
    #[must_use]
    pub fn forbidden_emote_set(&self) -> HashSet<String> {
        DEFAULT_FORBIDDEN_EMOTES
            .iter()
            .map(ToString::to_string)
            .chain(self.forbidden_emotes.iter().cloned())
            .collect()
    }

    /// Forbidden senders, lowercased for comparison.
    #[must_use]
    pub fn forbidden_user_set(&self) -> HashSet<String> {
        self.forbidden_users
            .iter()
            .map(|user| user.to_lowercase())
            .collect()
    }

    /// Default tracing filter directive derived from the verbosity flags.
    /// `--silent` beats `--quiet` beats `--log-level`.
    #[must_use]
    pub fn log_directive(&self) -> String {
        if self.silent {
            "off".to_string()
        } else if self.quiet {
            "warn".to_string()
        } else {
            self.log_level.to_string()
        }
    }
}
