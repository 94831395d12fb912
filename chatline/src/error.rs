use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Network error: {0}")]
    Network(String),
    /// The backend answered with a non-2xx status. `detail` is what the user sees.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },
    #[error("WebSocket not connected")]
    NotConnected,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("Account already exists. Please sign in.")]
    AccountExists,
    #[error("Not signed in")]
    NoSession,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enter a username first.")]
    EmptyTarget,
    #[error("You cannot start a chat with yourself.")]
    SelfChat,
    #[error("Add at least one member to the group.")]
    NoMembers,
    #[error("Message cannot be empty.")]
    EmptyMessage,
    #[error("Select a chat first.")]
    NoChatSelected,
    #[error("Username and password are required.")]
    MissingCredentials,
    #[error("{0}")]
    Field(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(err.to_string())
    }
}
