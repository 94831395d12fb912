use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsFrame};
use tracing::{debug, error, info, warn};
use url::Url;

use super::frames::{ChannelEvent, ConnectionState, InboundFrame, OutboundFrame};
use super::FrameSink;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::ChatId;

/// How long `close` waits for the connection task before aborting it
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Supplies the `Cookie` header for a handshake URL.
pub type CookieSource = Arc<dyn Fn(&Url) -> Option<String> + Send + Sync>;

struct ActiveConnection {
    chat_id: ChatId,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Owns the realtime connection for the selected chat.
///
/// At most one connection exists at a time. Switching targets tears the old
/// connection down, waiting for its task to finish, before the next one is
/// opened. Dropping the manager signals the task to send a close frame.
pub struct ChannelManager {
    config: ClientConfig,
    cookies: Option<CookieSource>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    write_tx: Arc<StdMutex<Option<mpsc::UnboundedSender<String>>>>,
    active: Option<ActiveConnection>,
}

impl ChannelManager {
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        let manager = Self {
            config,
            cookies: None,
            events_tx,
            state_tx: Arc::new(state_tx),
            write_tx: Arc::new(StdMutex::new(None)),
            active: None,
        };
        (manager, events_rx)
    }

    /// Present these cookies on every handshake (the backend authenticates sockets by session).
    pub fn with_cookies(mut self, cookies: CookieSource) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Chat the current connection belongs to.
    pub fn target(&self) -> Option<ChatId> {
        self.active.as_ref().map(|active| active.chat_id)
    }

    /// Point the channel at `target`, closing any previous connection first.
    ///
    /// Switching to the chat that is already connected is a no-op.
    pub async fn switch_to(&mut self, target: Option<ChatId>) -> Result<()> {
        if target.is_some() && self.target() == target && !self.is_finished() {
            return Ok(());
        }

        self.close().await;

        let Some(chat_id) = target else {
            return Ok(());
        };

        let url = self.config.chat_socket_url(chat_id)?;
        let cookie = self.cookies.as_ref().and_then(|source| source(&url));
        // Surface a bad url or cookie here rather than inside the task
        handshake_request(&url, cookie.as_deref())?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let connection = Connection {
            chat_id,
            url: url.clone(),
            cookie,
            reconnect_delay: self.config.reconnect_delay,
            max_reconnect_attempts: self.config.max_reconnect_attempts,
            events_tx: self.events_tx.clone(),
            state_tx: self.state_tx.clone(),
            write_tx: self.write_tx.clone(),
        };

        info!(chat_id, url = %url, "Opening realtime channel");
        connection.set_state(ConnectionState::Connecting);
        let task = tokio::spawn(connection.run(shutdown_rx));

        self.active = Some(ActiveConnection {
            chat_id,
            shutdown_tx,
            task,
        });
        Ok(())
    }

    /// Close the current connection, if any, and wait for its task to end.
    pub async fn close(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        debug!(chat_id = active.chat_id, "Closing realtime channel");
        let _ = active.shutdown_tx.send(());

        let mut task = active.task;
        if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
            warn!(chat_id = active.chat_id, "Realtime task did not stop in time, aborting");
            task.abort();
        }

        // An aborted task may not have reset shared state
        if let Ok(mut guard) = self.write_tx.lock() {
            *guard = None;
        }
        self.state_tx.send_replace(ConnectionState::Closed);
    }

    /// Queue a frame on the open connection.
    pub fn send(&self, frame: &OutboundFrame) -> Result<()> {
        if self.state() != ConnectionState::Open {
            return Err(Error::NotConnected);
        }

        let json = serde_json::to_string(frame)
            .map_err(|e| Error::Network(format!("cannot encode frame: {e}")))?;
        debug!(preview = %preview(&json), "Sending frame");

        let guard = self.write_tx.lock().map_err(|_| Error::NotConnected)?;
        match guard.as_ref() {
            Some(tx) => tx
                .send(json)
                .map_err(|_| Error::NotConnected),
            None => {
                warn!("Cannot send frame: not connected");
                Err(Error::NotConnected)
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.active
            .as_ref()
            .map_or(true, |active| active.task.is_finished())
    }
}

impl FrameSink for ChannelManager {
    fn send_frame(&self, frame: &OutboundFrame) -> Result<()> {
        self.send(frame)
    }
}

fn handshake_request(url: &Url, cookie: Option<&str>) -> Result<Request> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::Config(format!("invalid realtime url {url}: {e}")))?;
    if let Some(cookie) = cookie {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| Error::Config(format!("invalid cookie header: {e}")))?;
        request.headers_mut().insert(COOKIE, value);
    }
    Ok(request)
}

/// State owned by one connection task.
struct Connection {
    chat_id: ChatId,
    url: Url,
    cookie: Option<String>,
    reconnect_delay: Duration,
    max_reconnect_attempts: Option<u32>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    write_tx: Arc<StdMutex<Option<mpsc::UnboundedSender<String>>>>,
}

impl Connection {
    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) {
        let chat_id = self.chat_id;
        let mut failures: u32 = 0;

        loop {
            let request = match handshake_request(&self.url, self.cookie.as_deref()) {
                Ok(request) => request,
                Err(e) => {
                    error!(chat_id, error = %e, "Cannot build realtime handshake");
                    self.set_state(ConnectionState::Error);
                    return;
                }
            };

            let connected = tokio::select! {
                _ = &mut shutdown_rx => {
                    self.set_state(ConnectionState::Closed);
                    return;
                }
                result = connect_async(request) => result,
            };

            match connected {
                Ok((ws_stream, _)) => {
                    failures = 0;
                    info!(chat_id, "Realtime channel open");

                    let (mut ws_write, mut ws_read) = ws_stream.split();

                    // Create channel for outgoing messages
                    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                    self.set_writer(Some(tx));
                    self.set_state(ConnectionState::Open);

                    // Message loop
                    let mut should_reconnect = true;
                    loop {
                        tokio::select! {
                            _ = &mut shutdown_rx => {
                                if let Err(e) = ws_write.send(WsFrame::Close(None)).await {
                                    warn!(chat_id, error = %e, "Failed to send close frame");
                                }
                                should_reconnect = false;
                                break;
                            }
                            Some(data) = rx.recv() => {
                                if let Err(e) = ws_write.send(WsFrame::Text(data.into())).await {
                                    error!(chat_id, error = %e, "Failed to write frame");
                                    break;
                                }
                            }
                            msg = ws_read.next() => {
                                match msg {
                                    Some(Ok(WsFrame::Text(text))) => self.dispatch(text.as_str()),
                                    Some(Ok(WsFrame::Close(_))) | None => {
                                        info!(chat_id, "Server closed realtime channel");
                                        break;
                                    }
                                    Some(Err(e)) => {
                                        error!(chat_id, error = %e, "Realtime channel error");
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                        }
                    }

                    // Cleanup
                    self.set_writer(None);
                    self.set_state(ConnectionState::Closed);
                    info!(chat_id, "Realtime channel closed");

                    if !should_reconnect {
                        return;
                    }
                }
                Err(e) => {
                    error!(chat_id, error = %e, "Failed to open realtime channel");
                    self.set_state(ConnectionState::Error);
                }
            }

            failures += 1;
            if !self.may_retry(failures) {
                info!(chat_id, attempts = failures, "Giving up on realtime channel");
                return;
            }

            debug!(chat_id, delay_ms = self.reconnect_delay.as_millis() as u64, "Reconnecting");
            tokio::select! {
                _ = &mut shutdown_rx => {
                    self.set_state(ConnectionState::Closed);
                    return;
                }
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
            self.set_state(ConnectionState::Connecting);
        }
    }

    fn may_retry(&self, failures: u32) -> bool {
        self.max_reconnect_attempts.map_or(true, |max| failures <= max)
    }

    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<InboundFrame>(text) {
            Ok(InboundFrame::Chat(frame)) if !frame.message.is_empty() => {
                debug!(chat_id = self.chat_id, preview = %preview(text), "Received frame");
                let message = frame.into_message(self.chat_id);
                let _ = self.events_tx.send(ChannelEvent::Message(message));
            }
            Ok(InboundFrame::Chat(_)) => {
                debug!(chat_id = self.chat_id, "Ignoring frame without message text");
            }
            Ok(InboundFrame::Error { error }) => {
                warn!(chat_id = self.chat_id, error = %error, "Server reported frame error");
            }
            Err(e) => {
                warn!(chat_id = self.chat_id, error = %e, preview = %preview(text), "Dropping malformed frame");
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
        let _ = self.events_tx.send(ChannelEvent::State {
            chat_id: self.chat_id,
            state,
        });
    }

    fn set_writer(&self, tx: Option<mpsc::UnboundedSender<String>>) {
        if let Ok(mut guard) = self.write_tx.lock() {
            *guard = tx;
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}
