mod chat;
pub mod input;
mod message;
mod user;
pub mod validation;

pub use chat::{Chat, ChatId, ChatKind, ChatRecord, LastMessage};
pub use message::{Message, MessageId, MessageRecord};
pub use user::{Identity, UserSummary};
