use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use super::lock;
use crate::api::ChatBackend;
use crate::error::Result;
use crate::models::input::{StartChatInput, StartGroupInput};
use crate::models::{Chat, ChatId, LastMessage};

#[derive(Default)]
struct ChatListState {
    chats: Vec<Chat>,
    generation: u64,
}

/// Ordered chat list, most recently started first.
#[derive(Clone)]
pub struct ChatList {
    backend: Arc<dyn ChatBackend>,
    current_username: String,
    state: Arc<Mutex<ChatListState>>,
}

impl ChatList {
    pub fn new(backend: Arc<dyn ChatBackend>, current_username: impl Into<String>) -> Self {
        Self {
            backend,
            current_username: current_username.into(),
            state: Arc::new(Mutex::new(ChatListState::default())),
        }
    }

    pub fn snapshot(&self) -> Vec<Chat> {
        lock(&self.state).chats.clone()
    }

    pub fn get(&self, chat_id: ChatId) -> Option<Chat> {
        lock(&self.state).chats.iter().find(|c| c.id == chat_id).cloned()
    }

    /// Replace the list with the server's snapshot.
    ///
    /// On failure the list is left as it was. A refresh overtaken by a later
    /// one is dropped when it resolves.
    pub async fn refresh(&self) -> Result<()> {
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.generation
        };

        let records = self.backend.chats().await?;
        let chats: Vec<Chat> = records
            .into_iter()
            .map(|record| Chat::from_record(record, &self.current_username))
            .collect();

        let mut state = lock(&self.state);
        if state.generation != generation {
            debug!(generation, "Discarding superseded chat list");
            return Ok(());
        }
        info!(count = chats.len(), "Chat list refreshed");
        state.chats = chats;
        Ok(())
    }

    /// Patch the preview of one chat in place. Positions never change.
    pub fn apply_incoming(&self, chat_id: ChatId, preview: LastMessage) -> bool {
        let mut state = lock(&self.state);
        match state.chats.iter_mut().find(|c| c.id == chat_id) {
            Some(chat) => {
                chat.last_message = Some(preview);
                true
            }
            None => {
                debug!(chat_id, "Preview for unknown chat ignored");
                false
            }
        }
    }

    /// Start (or reopen) a direct chat and move it to the front.
    pub async fn start_chat(&self, target: &str) -> Result<Chat> {
        let input = StartChatInput::new(target, &self.current_username)?;
        let record = self.backend.start_chat(&input).await?;
        let chat = Chat::from_record(record, &self.current_username);
        info!(chat_id = chat.id, target = %input.username, "Chat started");
        Ok(self.promote(chat))
    }

    /// Create a group chat and move it to the front.
    pub async fn start_group<S: AsRef<str>>(&self, name: &str, members: &[S]) -> Result<Chat> {
        let input = StartGroupInput::new(name, members)?;
        let record = self.backend.start_group(&input).await?;
        let chat = Chat::from_record(record, &self.current_username);
        info!(chat_id = chat.id, members = input.members.len(), "Group chat started");
        Ok(self.promote(chat))
    }

    fn promote(&self, chat: Chat) -> Chat {
        let mut state = lock(&self.state);
        state.chats.retain(|c| c.id != chat.id);
        state.chats.insert(0, chat.clone());
        chat
    }
}
