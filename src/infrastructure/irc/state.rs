#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrcState {
    #[default]
    Disconnected,
    Connecting,
    Registering,
    Ready,
    Closing,
}

impl IrcState {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Registering | Self::Ready)
    }
}

impl std::fmt::Display for IrcState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Registering => write!(f, "Registering"),
            Self::Ready => write!(f, "Ready"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}
