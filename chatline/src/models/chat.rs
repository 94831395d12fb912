use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::MessageRecord;
use super::user::UserSummary;

pub type ChatId = i64;

/// Chat as serialized by the backend.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRecord {
    pub id: ChatId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub participants: Vec<UserSummary>,
    #[serde(default)]
    pub last_message: Option<MessageRecord>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatKind {
    Direct {
        other: Option<UserSummary>,
        participants: Vec<UserSummary>,
    },
    Group { name: String, members: Vec<UserSummary> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    pub sender: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    pub last_message: Option<LastMessage>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<MessageRecord> for LastMessage {
    fn from(record: MessageRecord) -> Self {
        Self {
            sender: record.sender,
            text: record.content,
            timestamp: Some(record.timestamp),
        }
    }
}

impl Chat {
    /// Resolve a backend record from the point of view of `me`.
    pub fn from_record(record: ChatRecord, me: &str) -> Self {
        let kind = if record.is_group {
            ChatKind::Group {
                name: record.name.unwrap_or_default().trim().to_string(),
                members: record.participants,
            }
        } else {
            let participants = record.participants;
            let other = participants
                .iter()
                .find(|p| !p.username.eq_ignore_ascii_case(me))
                .or_else(|| participants.first())
                .cloned();
            ChatKind::Direct { other, participants }
        };

        Self {
            id: record.id,
            kind,
            last_message: record.last_message.map(LastMessage::from),
            created_at: record.created_at,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ChatKind::Group { .. })
    }

    /// Participant with `username`, if the chat knows about them.
    pub fn participant(&self, username: &str) -> Option<&UserSummary> {
        match &self.kind {
            ChatKind::Direct { other, participants } => participants
                .iter()
                .find(|u| u.username == username)
                .or_else(|| other.as_ref().filter(|u| u.username == username)),
            ChatKind::Group { members, .. } => members.iter().find(|u| u.username == username),
        }
    }
}
