use std::sync::Arc;

use tracing::{info, warn};

use crate::api::ChatBackend;
use crate::error::{AuthError, Error, Result};
use crate::models::input::{Credentials, ProfileUpdate};
use crate::models::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

/// Decides between the signed-in and anonymous views.
pub struct SessionGate {
    backend: Arc<dyn ChatBackend>,
    identity: Option<Identity>,
    mode: AuthMode,
}

impl SessionGate {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            identity: None,
            mode: AuthMode::default(),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AuthMode) {
        self.mode = mode;
    }

    /// Resume an existing session. Any failure means anonymous.
    pub async fn bootstrap(&mut self) -> Option<Identity> {
        match self.backend.session().await {
            Ok(identity) => {
                info!(username = %identity.username, "Resumed session");
                self.identity = Some(identity);
            }
            Err(Error::Auth(AuthError::NoSession)) => {
                self.identity = None;
            }
            Err(e) => {
                warn!(error = %e, "Session check failed, continuing signed out");
                self.identity = None;
            }
        }
        self.identity.clone()
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<Identity> {
        self.mode = AuthMode::Login;
        let credentials = Credentials::new(username, password)?;
        let identity = self.backend.login(&credentials).await?;
        info!(username = %identity.username, "Signed in");
        self.identity = Some(identity.clone());
        Ok(identity)
    }

    /// Register and sign in. A taken username switches the gate back to login.
    pub async fn register(&mut self, username: &str, password: &str) -> Result<Identity> {
        let credentials = Credentials::new(username, password)?;
        match self.backend.register(&credentials).await {
            Ok(identity) => {
                info!(username = %identity.username, "Registered");
                self.identity = Some(identity.clone());
                Ok(identity)
            }
            Err(Error::Auth(AuthError::AccountExists)) => {
                self.mode = AuthMode::Login;
                Err(AuthError::AccountExists.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Sign out. The local session is dropped even if the request fails.
    pub async fn logout(&mut self) {
        if let Err(e) = self.backend.logout().await {
            warn!(error = %e, "Logout request failed");
        }
        self.identity = None;
        self.mode = AuthMode::Login;
    }

    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<Identity> {
        if self.identity.is_none() {
            return Err(AuthError::NoSession.into());
        }
        let identity = self.backend.update_profile(update).await?;
        info!(username = %identity.username, "Profile updated");
        self.identity = Some(identity.clone());
        Ok(identity)
    }
}
