use crate::domain::entities::ChatMessage;

/// Events emitted by the IRC client task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcEvent {
    /// Registration completed; the server accepted the anonymous nick.
    Ready {
        /// The nick the connection registered under.
        nick: String,
    },
    /// A channel join was confirmed by the self-nick JOIN echo.
    Joined {
        /// Channel name with leading `#`.
        channel: String,
    },
    /// A channel join was not confirmed within the join timeout.
    JoinFailed {
        /// Channel name with leading `#`.
        channel: String,
    },
    /// A PRIVMSG arrived on a joined channel.
    Message(ChatMessage),
    /// The connection ended; the controller decides whether to reconnect.
    Disconnected {
        /// Human-readable reason.
        reason: String,
    },
}
