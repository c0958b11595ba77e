//! Domain layer with core business entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Port definitions.
pub mod ports;

pub use entities::{ChatMessage, ImageContentType, ImageKey, ResolvedImage};
pub use ports::{DisplayPort, ImageResolverPort, SendOutcome};
