use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::lock;
use crate::api::ChatBackend;
use crate::error::{Error, Result, ValidationError};
use crate::models::input::SendMessageInput;
use crate::models::{ChatId, Message, MessageId};
use crate::realtime::{FrameSink, OutboundFrame};

#[derive(Default)]
struct FeedState {
    chat_id: Option<ChatId>,
    generation: u64,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// History replaced the feed; carries the message count.
    Applied(usize),
    /// The selection moved on before the response arrived.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPath {
    Realtime,
    /// Written over HTTP, then the feed was reloaded.
    Durable,
}

/// Messages of the selected chat, oldest first.
#[derive(Clone)]
pub struct MessageFeed {
    backend: Arc<dyn ChatBackend>,
    state: Arc<Mutex<FeedState>>,
}

impl MessageFeed {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(FeedState::default())),
        }
    }

    pub fn selected(&self) -> Option<ChatId> {
        lock(&self.state).chat_id
    }

    pub fn snapshot(&self) -> Vec<Message> {
        lock(&self.state).messages.clone()
    }

    pub fn last(&self) -> Option<Message> {
        lock(&self.state).messages.last().cloned()
    }

    /// Deselect and empty the feed. In-flight loads become stale.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.generation += 1;
        state.chat_id = None;
        state.messages.clear();
    }

    /// Select `chat_id` and replace the feed with its history.
    ///
    /// Selecting a different chat empties the feed at once. Failures clear the
    /// feed and surface; a response for a selection that has since changed is
    /// dropped, error or not.
    pub async fn load(&self, chat_id: ChatId) -> Result<LoadOutcome> {
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            if state.chat_id != Some(chat_id) {
                state.chat_id = Some(chat_id);
                state.messages.clear();
            }
            state.generation
        };

        let result = self.backend.messages(chat_id).await;

        let mut state = lock(&self.state);
        if state.generation != generation {
            debug!(chat_id, generation, "Discarding superseded history");
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(records) => {
                state.messages = records.into_iter().map(Message::from).collect();
                debug!(chat_id, count = state.messages.len(), "History loaded");
                Ok(LoadOutcome::Applied(state.messages.len()))
            }
            Err(e) => {
                state.messages.clear();
                warn!(chat_id, error = %e, "History load failed");
                Err(e)
            }
        }
    }

    /// Append a realtime message if it belongs to the selected chat.
    pub fn append_incoming(&self, message: Message) -> bool {
        let mut state = lock(&self.state);
        if state.chat_id != Some(message.chat_id) {
            debug!(chat_id = message.chat_id, "Message for another chat ignored");
            return false;
        }
        if matches!(message.id, MessageId::Server(_))
            && state.messages.iter().any(|m| m.id == message.id)
        {
            debug!(id = %message.id, "Duplicate message ignored");
            return false;
        }
        state.messages.push(message);
        true
    }

    /// Send over the realtime sink, falling back to a durable write plus a
    /// reload when the sink refuses the frame. Only a failed write is an error.
    pub async fn send_text(&self, sink: &dyn FrameSink, text: &str) -> Result<SendPath> {
        let chat_id = self.selected().ok_or(ValidationError::NoChatSelected)?;
        let input = SendMessageInput::new(chat_id, text)?;

        match sink.send_frame(&OutboundFrame::text(input.content.clone())) {
            Ok(()) => Ok(SendPath::Realtime),
            Err(e) => {
                if !matches!(e, Error::NotConnected) {
                    warn!(chat_id, error = %e, "Realtime send failed");
                }
                info!(chat_id, "Falling back to durable write");
                self.backend.post_message(&input).await?;
                // The write stands even if the reload does not
                if let Err(e) = self.load(chat_id).await {
                    warn!(chat_id, error = %e, "Reload after durable write failed");
                }
                Ok(SendPath::Durable)
            }
        }
    }
}
