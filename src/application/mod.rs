//! Application layer with the controller and its services.

/// Controller task wiring ingest, ranking and uploads.
pub mod controller;
/// Analyzer, ranking and emoji services.
pub mod services;
/// Operation state and channel set.
pub mod state;

pub use controller::{Controller, ControllerConfig};
pub use services::{MessageAnalyzer, RankedEntry, RankingBuffer};
pub use state::{ChannelSet, OperationState};
