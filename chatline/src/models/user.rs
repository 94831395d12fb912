use serde::{Deserialize, Serialize};

/// The signed-in user, as returned by the session, login and profile endpoints.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub status: String,
}

/// A chat participant or search hint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub profile: Option<Identity>,
}

impl UserSummary {
    /// Nickname when set, username otherwise.
    pub fn label(&self) -> &str {
        self.profile
            .as_ref()
            .map(|p| p.nickname.trim())
            .filter(|nick| !nick.is_empty())
            .unwrap_or(self.username.as_str())
    }

    pub fn avatar(&self) -> Option<&str> {
        self.profile.as_ref().and_then(|p| p.avatar.as_deref())
    }
}
