//! Display upload infrastructure.

pub mod client;
pub mod slots;

pub use client::{DisplayClient, MAX_CONSECUTIVE_FAILURES, PROBE_INTERVAL, UPLOAD_TIMEOUT};
pub use slots::SlotMirror;
