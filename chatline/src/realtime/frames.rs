use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{ChatId, Message, MessageId};

/// Chat message as relayed on a chat socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatFrame {
    #[serde(default)]
    pub id: Option<MessageId>,
    pub username: String,
    pub message: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Timestamps without an offset (or not parseable at all) count as missing.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc)))
}

/// Frames the server sends on a chat socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    Error { error: String },
    Chat(ChatFrame),
}

/// Frame sent to the server; it stamps sender, id and time itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub message: String,
}

impl ChatFrame {
    /// Missing ids get a local UUID, missing timestamps the receive time.
    pub fn into_message(self, chat_id: ChatId) -> Message {
        Message {
            id: self.id.unwrap_or_else(MessageId::local),
            chat_id,
            sender: self.username,
            text: self.message,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

impl OutboundFrame {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed => write!(f, "closed"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// Everything the channel manager reports, tagged with the chat it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    State {
        chat_id: ChatId,
        state: ConnectionState,
    },
    Message(Message),
}
