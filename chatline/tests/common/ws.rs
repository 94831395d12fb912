//! Minimal chat socket server: records handshakes and frames, echoes sends.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected { path: String, cookie: Option<String> },
    Received(String),
    Closed(String),
}

pub struct TestWsServer {
    pub port: u16,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    handle: JoinHandle<()>,
}

impl TestWsServer {
    /// With `drop_first`, the first connection is closed right after the handshake.
    pub async fn start(drop_first: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (events_tx, events) = mpsc::unbounded_channel();
        let outbound = Arc::new(Mutex::new(None));

        let handle = tokio::spawn({
            let outbound = outbound.clone();
            async move {
                let mut accepted = 0;
                while let Ok((stream, _)) = listener.accept().await {
                    accepted += 1;
                    let mut path = String::new();
                    let mut cookie = None;
                    let callback = |req: &Request, resp: Response| {
                        path = req.uri().path().to_string();
                        cookie = req
                            .headers()
                            .get("cookie")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        Ok::<Response, ErrorResponse>(resp)
                    };
                    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
                        continue;
                    };
                    let connected = ServerEvent::Connected {
                        path: path.clone(),
                        cookie,
                    };

                    if drop_first && accepted == 1 {
                        let _ = events_tx.send(connected);
                        let _ = ws.close(None).await;
                        continue;
                    }

                    // Pushes are possible as soon as the handshake is reported
                    let (tx, rx) = mpsc::unbounded_channel::<String>();
                    *outbound.lock().unwrap() = Some(tx);
                    let _ = events_tx.send(connected);
                    tokio::spawn(serve_connection(ws, rx, path, events_tx.clone()));
                }
            }
        });

        Self {
            port,
            events,
            outbound,
            handle,
        }
    }

    /// Send a raw text frame to the latest connection.
    pub fn push(&self, text: &str) {
        let guard = self.outbound.lock().unwrap();
        guard
            .as_ref()
            .expect("no connection to push to")
            .send(text.to_string())
            .unwrap();
    }

    pub async fn next_event(&mut self) -> ServerEvent {
        timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("Timeout waiting for server event")
            .expect("Server stopped")
    }

    pub async fn next_event_raw(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }
}

impl Drop for TestWsServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    path: String,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
) {
    let (mut write, mut read) = ws.split();
    let mut next_id = 500;

    loop {
        tokio::select! {
            Some(text) = outbound.recv() => {
                if write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let text = text.to_string();
                    let _ = events_tx.send(ServerEvent::Received(text.clone()));
                    let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                    if let Some(message) = parsed["message"].as_str() {
                        next_id += 1;
                        let echo = json!({
                            "id": next_id,
                            "username": "me",
                            "message": message,
                            "timestamp": "2024-05-01T10:00:00Z"
                        });
                        if write.send(Message::Text(echo.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            }
        }
    }

    let _ = events_tx.send(ServerEvent::Closed(path));
}

/// A local port with nothing listening on it.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
