use serde::{Deserialize, Serialize};

use crate::{Message, PresenceEntry};

/// Frames a client may send over the gateway socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Post a message to the room as the joined profile.
    Send { content: String },
    /// Explicitly end the room session before closing the socket.
    Leave,
}

/// Frames the gateway pushes to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once after a successful join: the full initial room view.
    Ready {
        session_id: String,
        messages: Vec<Message>,
        online: Vec<PresenceEntry>,
    },
    /// A message appended to the feed after `Ready`.
    MessageCreate { message: Message },
    /// The roster changed; carries the full current roster.
    RosterUpdate { online: Vec<PresenceEntry> },
    /// A recoverable error (e.g. rejected message content). The session
    /// stays open.
    Error { message: String },
}
