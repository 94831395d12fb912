//! Request bodies with garde validation.
//!
//! Every DTO is validated before a request is issued, so an invalid input
//! never reaches the network.

use std::fmt;
use std::path::PathBuf;

use garde::Validate;
use serde::Serialize;

use super::chat::ChatId;
use super::validation::{
    normalize_members, normalize_message, normalize_target, MAX_GROUP_NAME_LENGTH,
    MAX_MESSAGE_LENGTH, MAX_NICKNAME_LENGTH, MAX_STATUS_LENGTH, MAX_USERNAME_LENGTH,
};
use crate::error::ValidationError;

/// Username and password for login and registration
#[derive(Clone, Serialize, Validate)]
#[garde(context(()))]
pub struct Credentials {
    #[garde(length(chars, min = 1, max = MAX_USERNAME_LENGTH))]
    pub username: String,
    #[garde(length(min = 1))]
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Result<Self, ValidationError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ValidationError::MissingCredentials);
        }
        let input = Self {
            username: username.to_string(),
            password: password.to_string(),
        };
        input.validate_input()?;
        Ok(input)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Input for starting (or reopening) a direct chat
#[derive(Debug, Clone, Serialize, Validate)]
#[garde(context(()))]
pub struct StartChatInput {
    #[garde(length(chars, min = 1, max = MAX_USERNAME_LENGTH))]
    pub username: String,
}

impl StartChatInput {
    pub fn new(target: &str, current_username: &str) -> Result<Self, ValidationError> {
        let input = Self {
            username: normalize_target(target, current_username)?,
        };
        input.validate_input()?;
        Ok(input)
    }
}

/// Input for creating a group chat
#[derive(Debug, Clone, Serialize, Validate)]
#[garde(context(()))]
pub struct StartGroupInput {
    #[garde(length(chars, max = MAX_GROUP_NAME_LENGTH))]
    pub name: String,
    #[garde(length(min = 1), inner(length(chars, min = 1, max = MAX_USERNAME_LENGTH)))]
    pub members: Vec<String>,
}

impl StartGroupInput {
    pub fn new<S: AsRef<str>>(name: &str, members: &[S]) -> Result<Self, ValidationError> {
        let input = Self {
            name: name.trim().to_string(),
            members: normalize_members(members)?,
        };
        input.validate_input()?;
        Ok(input)
    }
}

/// Durable message write
#[derive(Debug, Clone, Serialize, Validate)]
#[garde(context(()))]
pub struct SendMessageInput {
    #[garde(skip)]
    pub chat: ChatId,
    #[garde(length(chars, min = 1, max = MAX_MESSAGE_LENGTH))]
    pub content: String,
}

impl SendMessageInput {
    pub fn new(chat: ChatId, text: &str) -> Result<Self, ValidationError> {
        let input = Self {
            chat,
            content: normalize_message(text)?,
        };
        input.validate_input()?;
        Ok(input)
    }
}

/// Image attached to a profile update
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AvatarUpload {
    pub async fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let bytes = tokio::fs::read(&path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "avatar".to_string());
        Ok(Self { file_name, bytes })
    }
}

/// Multipart profile update
#[derive(Debug, Clone, Validate)]
#[garde(context(()))]
pub struct ProfileUpdate {
    #[garde(length(chars, max = MAX_NICKNAME_LENGTH))]
    pub nickname: String,
    #[garde(length(chars, max = MAX_STATUS_LENGTH))]
    pub status: String,
    #[garde(skip)]
    pub avatar: Option<AvatarUpload>,
}

impl ProfileUpdate {
    pub fn new(nickname: &str, status: &str, avatar: Option<AvatarUpload>) -> Result<Self, ValidationError> {
        let input = Self {
            nickname: nickname.trim().to_string(),
            status: status.trim().to_string(),
            avatar,
        };
        input.validate_input()?;
        Ok(input)
    }
}

/// Helper trait to convert garde validation errors to `ValidationError`
pub trait ValidateExt {
    fn validate_input(&self) -> Result<(), ValidationError>;
}

impl<T: Validate<Context = ()>> ValidateExt for T {
    fn validate_input(&self) -> Result<(), ValidationError> {
        self.validate().map_err(|e| ValidationError::Field(e.to_string()))
    }
}
