//! Client configuration.
//!
//! Every component that talks to the backend receives a `ClientConfig`
//! explicitly; nothing reads base URLs from ambient state.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::models::ChatId;

const DEFAULT_API_BASE: &str = "http://localhost:8000";
const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: Url,
    pub ws_base: Url,
    /// Delay between realtime reconnect attempts
    pub reconnect_delay: Duration,
    /// `None` retries forever, `Some(0)` disables reconnects
    pub max_reconnect_attempts: Option<u32>,
    pub search_debounce: Duration,
    pub request_timeout: Duration,
    pub log_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Config for `api_base` with the websocket base derived from it.
    pub fn new(api_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base)?;
        let ws_base = derive_ws_base(&api_base)?;
        Ok(Self {
            api_base,
            ws_base,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_reconnect_attempts: None,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            log_dir: None,
        })
    }

    pub fn with_ws_base(mut self, ws_base: &str) -> Result<Self> {
        self.ws_base = Url::parse(ws_base)?;
        Ok(self)
    }

    /// Load from the process environment.
    ///
    /// `CHATLINE_API_BASE` is taken from the build environment first, then the
    /// runtime environment, then the localhost default.
    pub fn from_env() -> Result<Self> {
        let build_time = option_env!("CHATLINE_API_BASE").map(String::from);
        Self::from_lookup(|key| {
            if key == "CHATLINE_API_BASE" && build_time.is_some() {
                return build_time.clone();
            }
            std::env::var(key).ok()
        })
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base = lookup("CHATLINE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let mut config = Self::new(&api_base)?;

        if let Some(ws_base) = lookup("CHATLINE_WS_BASE") {
            config = config.with_ws_base(&ws_base)?;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "CHATLINE_RECONNECT_DELAY_MS")? {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        config.max_reconnect_attempts = parse_var(&lookup, "CHATLINE_MAX_RECONNECTS")?;
        if let Some(ms) = parse_var::<u64>(&lookup, "CHATLINE_SEARCH_DEBOUNCE_MS")? {
            config.search_debounce = Duration::from_millis(ms);
        }
        config.log_dir = lookup("CHATLINE_LOG_DIR").map(PathBuf::from);
        Ok(config)
    }

    /// Absolute URL for a backend path such as `/api/chats/`.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", trim_base(&self.api_base), path))?)
    }

    /// Realtime endpoint for one chat.
    pub fn chat_socket_url(&self, chat_id: ChatId) -> Result<Url> {
        Ok(Url::parse(&format!("{}/ws/chat/{}/", trim_base(&self.ws_base), chat_id))?)
    }
}

fn trim_base(url: &Url) -> &str {
    url.as_str().trim_end_matches('/')
}

fn derive_ws_base(api_base: &Url) -> Result<Url> {
    let scheme = match api_base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(Error::Config(format!("unsupported api scheme: {other}"))),
    };
    let mut ws_base = api_base.clone();
    ws_base
        .set_scheme(scheme)
        .map_err(|()| Error::Config(format!("cannot derive websocket url from {api_base}")))?;
    Ok(ws_base)
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(None),
    }
}
