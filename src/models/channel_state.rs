use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`NotificationChannel`](crate::NotificationChannel).
///
/// ```text
/// Idle ──connect──▶ Connecting ──ready──▶ Connected
///   ▲                   │  ▲                  │
///   │                   ▼  │ retry            │ lost / protocol error
///   └──disconnect── Disconnected ◀────────────┘
/// ```
///
/// `Connected` implies a live session with its subscriptions in place;
/// every other state implies zero active subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Never connected, or explicitly disconnected.
    #[default]
    Idle,
    /// A session is being opened.
    Connecting,
    /// Session ready, subscriptions active.
    Connected,
    /// Session lost; a reconnection may be pending, or retries are exhausted.
    Disconnected,
}

impl ChannelState {
    /// Whether the channel currently holds a ready session.
    pub fn is_connected(self) -> bool {
        matches!(self, ChannelState::Connected)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}
