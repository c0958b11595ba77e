//! Parsed chat message as delivered by the IRC client.

use std::collections::HashMap;

/// One PRIVMSG received from a joined channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Channel the message was posted to, with leading `#`.
    pub channel: String,
    /// Sender nick, lowercased.
    pub sender: String,
    /// IRCv3 message tags, unescaped.
    pub tags: HashMap<String, String>,
    /// Message text.
    pub text: String,
}

impl ChatMessage {
    /// Returns the raw `emotes` tag, if the message carries one.
    #[must_use]
    pub fn emotes_tag(&self) -> Option<&str> {
        self.tags.get("emotes").map(String::as_str)
    }
}
