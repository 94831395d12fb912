//! Ties the chat list, the message feed and the realtime channel together.
//!
//! The feed's selection is the single source of truth for which chat is
//! open. Channel events that belong to any other chat are ignored, which
//! covers events still queued from a connection that was just closed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::ChatBackend;
use crate::error::Result;
use crate::models::{Chat, ChatId, Identity, Message};
use crate::realtime::{ChannelEvent, ChannelManager, ConnectionState};
use crate::store::{ChatList, LoadOutcome, MessageFeed, SendPath};

/// What handling a channel event changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
    Connection(ConnectionState),
    MessageAppended(Message),
    /// The channel came back after a drop and the feed was reloaded.
    Reconciled(LoadOutcome),
    Ignored,
}

pub struct ChatSync {
    identity: Identity,
    chats: ChatList,
    feed: MessageFeed,
    channel: ChannelManager,
    connection: ConnectionState,
    opened_before: bool,
}

impl ChatSync {
    pub fn new(backend: Arc<dyn ChatBackend>, channel: ChannelManager, identity: Identity) -> Self {
        Self {
            chats: ChatList::new(backend.clone(), identity.username.clone()),
            feed: MessageFeed::new(backend),
            identity,
            channel,
            connection: ConnectionState::Closed,
            opened_before: false,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn chats(&self) -> &ChatList {
        &self.chats
    }

    pub fn feed(&self) -> &MessageFeed {
        &self.feed
    }

    pub fn selected(&self) -> Option<ChatId> {
        self.feed.selected()
    }

    pub fn selected_chat(&self) -> Option<Chat> {
        self.selected().and_then(|id| self.chats.get(id))
    }

    /// Connection state of the selected chat's channel.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub async fn refresh_chats(&self) -> Result<()> {
        self.chats.refresh().await
    }

    /// Open `chat_id` (or nothing): the channel moves first, then history loads.
    pub async fn select_chat(&mut self, chat_id: Option<ChatId>) -> Result<Option<LoadOutcome>> {
        self.opened_before = false;

        let Some(chat_id) = chat_id else {
            self.feed.clear();
            self.channel.switch_to(None).await?;
            self.connection = ConnectionState::Closed;
            return Ok(None);
        };

        info!(chat_id, "Selecting chat");
        self.connection = ConnectionState::Connecting;
        let (switched, loaded) = tokio::join!(self.channel.switch_to(Some(chat_id)), self.feed.load(chat_id));
        if let Err(e) = switched {
            warn!(chat_id, error = %e, "Realtime channel unavailable");
            self.connection = ConnectionState::Error;
        }
        loaded.map(Some)
    }

    pub async fn handle_event(&mut self, event: ChannelEvent) -> Result<SyncUpdate> {
        let selected = self.selected();
        match event {
            ChannelEvent::State { chat_id, state } => {
                if selected != Some(chat_id) {
                    debug!(chat_id, %state, "State change for unselected chat");
                    return Ok(SyncUpdate::Ignored);
                }
                self.connection = state;
                if state != ConnectionState::Open {
                    return Ok(SyncUpdate::Connection(state));
                }
                if !self.opened_before {
                    self.opened_before = true;
                    return Ok(SyncUpdate::Connection(state));
                }
                info!(chat_id, "Channel reopened, reloading history");
                let outcome = self.feed.load(chat_id).await?;
                Ok(SyncUpdate::Reconciled(outcome))
            }
            ChannelEvent::Message(message) => {
                if selected != Some(message.chat_id) {
                    return Ok(SyncUpdate::Ignored);
                }
                if !self.feed.append_incoming(message.clone()) {
                    return Ok(SyncUpdate::Ignored);
                }
                self.chats.apply_incoming(message.chat_id, message.preview());
                Ok(SyncUpdate::MessageAppended(message))
            }
        }
    }

    /// Send to the selected chat.
    ///
    /// Realtime sends show up once the server echoes them. A durable send has
    /// already reloaded the feed, so the preview is patched from it here.
    pub async fn send_text(&self, text: &str) -> Result<SendPath> {
        let path = self.feed.send_text(&self.channel, text).await?;
        if path == SendPath::Durable {
            if let (Some(chat_id), Some(last)) = (self.selected(), self.feed.last()) {
                self.chats.apply_incoming(chat_id, last.preview());
            }
        }
        Ok(path)
    }

    /// Start a direct chat and open it.
    pub async fn start_chat(&mut self, target: &str) -> Result<Chat> {
        let chat = self.chats.start_chat(target).await?;
        self.open_started(&chat).await;
        Ok(chat)
    }

    /// Create a group chat and open it.
    pub async fn start_group<S: AsRef<str>>(&mut self, name: &str, members: &[S]) -> Result<Chat> {
        let chat = self.chats.start_group(name, members).await?;
        self.open_started(&chat).await;
        Ok(chat)
    }

    /// Close the channel and drop the selection.
    pub async fn shutdown(&mut self) {
        self.channel.close().await;
        self.feed.clear();
        self.connection = ConnectionState::Closed;
        self.opened_before = false;
    }

    // The chat exists at this point; a failed history load only leaves the feed empty.
    async fn open_started(&mut self, chat: &Chat) {
        if let Err(e) = self.select_chat(Some(chat.id)).await {
            warn!(chat_id = chat.id, error = %e, "Opened new chat without history");
        }
    }
}
