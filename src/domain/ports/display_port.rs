//! Port definition for the display upload client.

use serde::Deserialize;

use crate::domain::entities::ResolvedImage;

/// Result type for display operations.
pub type DisplayResult<T> = std::result::Result<T, DisplayError>;

/// Errors that can occur while talking to the display.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DisplayError {
    /// Transport-level failure (connect, send, read).
    #[error("display transport error: {0}")]
    Transport(String),
    /// The display answered with a non-success status.
    #[error("display rejected request with status {0}")]
    Status(u16),
    /// The status response body could not be decoded.
    #[error("display status decode error: {0}")]
    Decode(String),
}

/// Outcome of handing one image to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The bytes reached the display queue.
    Accepted,
    /// The slot mirror shows no free slot; nothing was sent.
    Busy,
    /// Transport failure, or the display is currently marked unreachable.
    Unreachable,
}

/// Free-slot report returned by the display status endpoint.
///
/// This is the only source of truth for the slot mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SlotStatus {
    /// Currently free upload slots.
    pub free: u32,
    /// Total slot count of the device.
    pub capacity: u32,
}

/// Port for display upload operations.
///
/// Implementations own the slot mirror; all mutation happens through the
/// controller task that owns the port instance.
#[async_trait::async_trait]
pub trait DisplayPort: Send {
    /// Attempts to upload one image.
    ///
    /// Returns [`SendOutcome::Busy`] without touching the network when the
    /// mirror shows no free slot. Never retries.
    async fn try_send(&mut self, image: &ResolvedImage, prio: bool) -> SendOutcome;

    /// Empties the remote queue and blanks the display.
    ///
    /// # Errors
    /// Returns an error when the request fails; the mirror is only reset on
    /// success.
    async fn clear(&mut self) -> DisplayResult<()>;

    /// Polls the status endpoint and refreshes the slot mirror.
    ///
    /// # Errors
    /// Returns an error when the probe fails; three consecutive failures
    /// mark the display unreachable.
    async fn probe(&mut self) -> DisplayResult<SlotStatus>;

    /// Free slots according to the mirror.
    fn free_slots(&self) -> u32;

    /// Device capacity according to the mirror (0 until learned).
    fn capacity(&self) -> u32;

    /// Uploads believed in flight according to the mirror.
    fn in_flight(&self) -> u32;

    /// Whether the display is currently considered reachable.
    fn is_reachable(&self) -> bool;

    /// Forgets mirror and health state (used when operation stops).
    fn reset(&mut self);
}
