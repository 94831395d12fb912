//! Text shown for chats and messages.

use chrono::{DateTime, Local, Utc};
use url::Url;

use crate::models::{Chat, ChatKind};

pub const DEFAULT_PREVIEW: &str = "No messages yet";
const PREVIEW_CHARS: usize = 40;

/// Group name, else the other participants, else `Chat {id}`.
pub fn chat_title(chat: &Chat, current_username: &str) -> String {
    let others: Vec<&str> = match &chat.kind {
        ChatKind::Group { name, .. } if !name.trim().is_empty() => {
            return name.trim().to_string();
        }
        ChatKind::Group { members, .. } => members
            .iter()
            .filter(|u| !u.username.eq_ignore_ascii_case(current_username))
            .map(|u| u.label())
            .collect(),
        ChatKind::Direct { other, .. } => other
            .iter()
            .filter(|u| !u.username.eq_ignore_ascii_case(current_username))
            .map(|u| u.label())
            .collect(),
    };

    if others.is_empty() {
        format!("Chat {}", chat.id)
    } else {
        others.join(", ")
    }
}

/// Label for a message sender within `chat`.
pub fn sender_label(chat: &Chat, username: &str) -> String {
    chat.participant(username)
        .map(|u| u.label().to_string())
        .unwrap_or_else(|| username.to_string())
}

pub fn preview_line(chat: &Chat) -> String {
    let Some(last) = chat.last_message.as_ref().filter(|m| !m.text.is_empty()) else {
        return DEFAULT_PREVIEW.to_string();
    };
    let text: String = last.text.chars().take(PREVIEW_CHARS).collect();
    match chat.participant(&last.sender) {
        Some(user) => format!("{}: {}", user.label(), text),
        None => text,
    }
}

/// Absolute avatar URL; relative paths live under the backend's media root.
pub fn avatar_url(avatar: &str, api_base: &Url) -> String {
    if avatar.starts_with("http") {
        return avatar.to_string();
    }
    format!(
        "{}/media/{}",
        api_base.as_str().trim_end_matches('/'),
        avatar.trim_start_matches('/')
    )
}

/// Avatar of the other participant of a direct chat.
pub fn chat_avatar(chat: &Chat, api_base: &Url) -> Option<String> {
    match &chat.kind {
        ChatKind::Direct { other, .. } => other
            .as_ref()
            .and_then(|u| u.avatar())
            .map(|a| avatar_url(a, api_base)),
        ChatKind::Group { .. } => None,
    }
}

pub fn format_time(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M").to_string()
}
