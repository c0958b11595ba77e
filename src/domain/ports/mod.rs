//! Port definitions for external adapters.

mod display_port;
mod resolver_port;

pub use display_port::{DisplayError, DisplayPort, DisplayResult, SendOutcome, SlotStatus};
pub use resolver_port::{CacheError, CacheResult, ImageResolverPort};
