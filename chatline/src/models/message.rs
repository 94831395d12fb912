use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chat::{ChatId, LastMessage};

/// Server ids are integers; frames that arrive without one get a local UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Server(i64),
    Local(String),
}

impl MessageId {
    pub fn local() -> Self {
        MessageId::Local(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Server(id) => write!(f, "{id}"),
            MessageId::Local(id) => f.write_str(id),
        }
    }
}

/// Message as stored by the backend.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageRecord {
    pub id: i64,
    pub chat: ChatId,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: MessageId::Server(record.id),
            chat_id: record.chat,
            sender: record.sender,
            text: record.content,
            timestamp: record.timestamp,
        }
    }
}

impl Message {
    pub fn preview(&self) -> LastMessage {
        LastMessage {
            sender: self.sender.clone(),
            text: self.text.clone(),
            timestamp: Some(self.timestamp),
        }
    }
}
