pub mod emoji;
pub mod message_analyzer;
pub mod ranking;

pub use emoji::match_emoji;
pub use message_analyzer::MessageAnalyzer;
pub use ranking::{RankedEntry, RankingBuffer};
