//! Entity definitions.

mod chat_message;
mod image_key;
mod resolved_image;

pub use chat_message::ChatMessage;
pub use image_key::{EmoteFormat, EmoteScale, EmoteTheme, ImageKey};
pub use resolved_image::{ImageContentType, ResolvedImage};
