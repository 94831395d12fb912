//! In-memory backend and websocket helpers shared by the integration tests.

#![allow(dead_code)]

pub mod ws;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatline_lib::api::ChatBackend;
use chatline_lib::config::ClientConfig;
use chatline_lib::error::{AuthError, Error, Result};
use chatline_lib::models::input::{Credentials, ProfileUpdate, SendMessageInput, StartChatInput, StartGroupInput};
use chatline_lib::models::{ChatId, ChatRecord, Identity, MessageRecord, UserSummary};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

pub fn identity(id: i64, username: &str) -> Identity {
    Identity {
        id,
        username: username.to_string(),
        nickname: String::new(),
        avatar: None,
        status: String::new(),
    }
}

pub fn user(id: i64, username: &str) -> UserSummary {
    UserSummary {
        id,
        username: username.to_string(),
        profile: None,
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn message(id: i64, chat: ChatId, sender: &str, content: &str, secs: i64) -> MessageRecord {
    MessageRecord {
        id,
        chat,
        sender: sender.to_string(),
        content: content.to_string(),
        timestamp: at(secs),
    }
}

pub fn direct(id: ChatId, me: &str, other: &str) -> ChatRecord {
    ChatRecord {
        id,
        name: None,
        is_group: false,
        participants: vec![user(1, me), user(id + 100, other)],
        last_message: None,
        created_at: Some(at(0)),
    }
}

/// Config whose realtime endpoint is the local test server on `ws_port`.
pub fn test_config(ws_port: u16) -> ClientConfig {
    let mut config = ClientConfig::new("http://127.0.0.1:9")
        .unwrap()
        .with_ws_base(&format!("ws://127.0.0.1:{ws_port}"))
        .unwrap();
    config.reconnect_delay = Duration::from_millis(50);
    config.search_debounce = Duration::from_millis(300);
    config
}

/// Backend fake that records every call as a short string.
pub struct FakeBackend {
    me: Identity,
    chats: Mutex<Vec<ChatRecord>>,
    histories: Mutex<HashMap<ChatId, Vec<MessageRecord>>>,
    users: Mutex<Vec<UserSummary>>,
    gates: Mutex<HashMap<ChatId, Arc<Notify>>>,
    failures: Mutex<HashMap<&'static str, Error>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicI64,
}

impl FakeBackend {
    pub fn new(me: &str) -> Arc<Self> {
        Arc::new(Self {
            me: identity(1, me),
            chats: Mutex::new(Vec::new()),
            histories: Mutex::new(HashMap::new()),
            users: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1000),
        })
    }

    pub fn with_chats(&self, chats: Vec<ChatRecord>) {
        *self.chats.lock().unwrap() = chats;
    }

    pub fn with_history(&self, chat_id: ChatId, messages: Vec<MessageRecord>) {
        self.histories.lock().unwrap().insert(chat_id, messages);
    }

    pub fn with_users(&self, users: Vec<UserSummary>) {
        *self.users.lock().unwrap() = users;
    }

    /// History loads for `chat_id` wait until the returned notify fires.
    pub fn gate(&self, chat_id: ChatId) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(chat_id, notify.clone());
        notify
    }

    /// Make `op` fail with `error` from now on.
    pub fn fail(&self, op: &'static str, error: Error) {
        self.failures.lock().unwrap().insert(op, error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub async fn wait_for_call(&self, call: &str) {
        for _ in 0..200 {
            if self.count(call) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("backend never saw {call}; calls: {:?}", self.calls());
    }

    fn record(&self, op: &'static str, detail: String) -> Result<()> {
        let call = if detail.is_empty() {
            op.to_string()
        } else {
            format!("{op} {detail}")
        };
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get(op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn session(&self) -> Result<Identity> {
        self.record("session", String::new())?;
        Ok(self.me.clone())
    }

    async fn login(&self, credentials: &Credentials) -> Result<Identity> {
        self.record("login", credentials.username.clone())?;
        Ok(identity(self.me.id, &credentials.username))
    }

    async fn register(&self, credentials: &Credentials) -> Result<Identity> {
        self.record("register", credentials.username.clone())?;
        Ok(identity(self.me.id, &credentials.username))
    }

    async fn logout(&self) -> Result<()> {
        self.record("logout", String::new())
    }

    async fn chats(&self) -> Result<Vec<ChatRecord>> {
        self.record("chats", String::new())?;
        Ok(self.chats.lock().unwrap().clone())
    }

    async fn start_chat(&self, input: &StartChatInput) -> Result<ChatRecord> {
        self.record("start_chat", input.username.clone())?;
        let mut chats = self.chats.lock().unwrap();
        let existing = chats.iter().find(|c| {
            !c.is_group && c.participants.iter().any(|p| p.username == input.username)
        });
        if let Some(chat) = existing {
            return Ok(chat.clone());
        }
        let chat = direct(self.next_id(), &self.me.username, &input.username);
        chats.push(chat.clone());
        Ok(chat)
    }

    async fn start_group(&self, input: &StartGroupInput) -> Result<ChatRecord> {
        self.record("start_group", format!("{} {}", input.name, input.members.join(",")))?;
        let mut participants = vec![user(self.me.id, &self.me.username)];
        participants.extend(input.members.iter().enumerate().map(|(i, m)| user(10 + i as i64, m)));
        let chat = ChatRecord {
            id: self.next_id(),
            name: Some(input.name.clone()),
            is_group: true,
            participants,
            last_message: None,
            created_at: Some(at(0)),
        };
        self.chats.lock().unwrap().push(chat.clone());
        Ok(chat)
    }

    async fn messages(&self, chat_id: ChatId) -> Result<Vec<MessageRecord>> {
        let gate = self.gates.lock().unwrap().get(&chat_id).cloned();
        self.record("messages", chat_id.to_string())?;
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(&chat_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn post_message(&self, input: &SendMessageInput) -> Result<Option<MessageRecord>> {
        self.record("post_message", format!("{} {}", input.chat, input.content))?;
        let mut histories = self.histories.lock().unwrap();
        let history = histories.entry(input.chat).or_default();
        let record = message(
            self.next_id(),
            input.chat,
            &self.me.username,
            &input.content,
            history.len() as i64 + 60,
        );
        history.push(record.clone());
        Ok(Some(record))
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>> {
        self.record("search_users", query.to_string())?;
        let query = query.to_lowercase();
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.username.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<Identity> {
        self.record("update_profile", update.nickname.clone())?;
        Ok(Identity {
            nickname: update.nickname.clone(),
            status: update.status.clone(),
            ..self.me.clone()
        })
    }
}

pub fn no_session() -> Error {
    AuthError::NoSession.into()
}
