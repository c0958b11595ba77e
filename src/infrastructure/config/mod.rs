//! Application configuration.

mod app_config;

pub use app_config::{AppConfig, DEFAULT_FORBIDDEN_EMOTES, LogLevel};
