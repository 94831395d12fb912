//! Backend collaborator.
//!
//! The stores only talk to the `ChatBackend` trait; `ApiClient` is the HTTP
//! implementation used by the binary.

mod client;
mod response;

pub use client::ApiClient;
pub use response::{decode_response, ResponseBody};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::input::{Credentials, ProfileUpdate, SendMessageInput, StartChatInput, StartGroupInput};
use crate::models::{ChatId, ChatRecord, Identity, MessageRecord, UserSummary};

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Current identity, or `AuthError::NoSession` when anonymous.
    async fn session(&self) -> Result<Identity>;
    async fn login(&self, credentials: &Credentials) -> Result<Identity>;
    async fn register(&self, credentials: &Credentials) -> Result<Identity>;
    async fn logout(&self) -> Result<()>;

    async fn chats(&self) -> Result<Vec<ChatRecord>>;
    async fn start_chat(&self, input: &StartChatInput) -> Result<ChatRecord>;
    async fn start_group(&self, input: &StartGroupInput) -> Result<ChatRecord>;

    async fn messages(&self, chat_id: ChatId) -> Result<Vec<MessageRecord>>;
    /// Durable write. The backend may answer without a body.
    async fn post_message(&self, input: &SendMessageInput) -> Result<Option<MessageRecord>>;

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<Identity>;
}
