//! Controller-owned operation state.

/// Top-level lifecycle of the bridge. Only the controller mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    /// Nothing runs; no IRC socket, no display probes.
    #[default]
    Off,
    /// IRC is connecting or reconnecting; uploads wait.
    Starting,
    /// Normal operation.
    On,
    /// Analysis and ranking continue; uploads are suspended.
    Paused,
    /// Orderly shutdown in progress.
    Stopping,
}

impl OperationState {
    /// Chat messages are processed in these states.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::On | Self::Paused)
    }

    /// Uploads may happen only here.
    #[must_use]
    pub const fn accepts_uploads(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "Off"),
            Self::Starting => write!(f, "Starting"),
            Self::On => write!(f, "On"),
            Self::Paused => write!(f, "Paused"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Ordered, deduplicated set of normalized channel names.
#[derive(Debug, Clone, Default)]
pub struct ChannelSet {
    channels: Vec<String>,
}

impl ChannelSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes a channel name: lowercase with a leading `#`.
    #[must_use]
    pub fn normalize(name: &str) -> String {
        let lower = name.trim().trim_start_matches('#').to_lowercase();
        format!("#{lower}")
    }

    /// Inserts a name; returns true when it was not present yet.
    pub fn insert(&mut self, name: &str) -> bool {
        let normalized = Self::normalize(name);
        if self.channels.contains(&normalized) {
            return false;
        }
        self.channels.push(normalized);
        true
    }

    /// Whether a (not necessarily normalized) name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains(&Self::normalize(name))
    }

    /// Normalized names, in insertion order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.channels.clone()
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true when no channel is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Removes all channels.
    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(ChannelSet::normalize("Chan"), "#chan");
        assert_eq!(ChannelSet::normalize("#ALREADY"), "#already");
        assert_eq!(ChannelSet::normalize("  spaced "), "#spaced");
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut set = ChannelSet::new();
        assert!(set.insert("a"));
        assert!(set.insert("#b"));
        assert!(!set.insert("A"));
        assert_eq!(set.to_vec(), vec!["#a", "#b"]);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut set = ChannelSet::new();
        set.insert("z");
        set.insert("a");
        set.insert("m");
        assert_eq!(set.to_vec(), vec!["#z", "#a", "#m"]);
    }

    #[test]
    fn test_operation_state_predicates() {
        assert!(OperationState::On.is_running());
        assert!(OperationState::Paused.is_running());
        assert!(!OperationState::Starting.is_running());
        assert!(OperationState::On.accepts_uploads());
        assert!(!OperationState::Paused.accepts_uploads());
    }
}
