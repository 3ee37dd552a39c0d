//! Channel lifecycle types

/// Logical channels to the dev server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Agent conversation events
    Conversation,
    /// Project reload notifications
    ProjectChanges,
    /// Conversation with the built-in studio assistant
    Assistant,
}

impl ChannelKind {
    /// Server path of the channel's WebSocket endpoint
    pub fn path(&self) -> &'static str {
        match self {
            ChannelKind::Conversation => "/ws/chat",
            ChannelKind::ProjectChanges => "/ws/reload",
            ChannelKind::Assistant => "/ws/assistant",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::Conversation => "chat",
            ChannelKind::ProjectChanges => "reload",
            ChannelKind::Assistant => "assistant",
        }
    }

    /// Whether the channel carries conversation events
    pub fn is_conversation(&self) -> bool {
        matches!(self, ChannelKind::Conversation | ChannelKind::Assistant)
    }
}

/// Connection state of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Created, not yet started
    Idle,
    /// Connect attempt in flight
    Connecting,
    /// Connected; sends are accepted
    Open,
    /// Disconnected; a reconnect is scheduled
    Closed,
    /// Torn down; no further transitions
    Unmounted,
}

impl ChannelState {
    pub fn is_open(&self) -> bool {
        matches!(self, ChannelState::Open)
    }
}

/// Events emitted by a channel to its consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The transport opened
    Connected,
    /// A text frame arrived
    Frame(String),
    /// An open transport closed
    Disconnected,
}
