use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::response::{decode_response, ResponseBody};
use super::ChatBackend;
use crate::config::ClientConfig;
use crate::error::{AuthError, Error, Result};
use crate::models::input::{
    Credentials, ProfileUpdate, SendMessageInput, StartChatInput, StartGroupInput,
};
use crate::models::{ChatId, ChatRecord, Identity, MessageRecord, UserSummary};

const CSRF_COOKIE_NAME: &str = "csrftoken";
const CSRF_HEADER_NAME: &str = "X-CSRFToken";

enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form(Form),
}

/// HTTP client for the chat backend.
///
/// Session cookies live in the client's own jar; the CSRF token for unsafe
/// methods is read from that jar rather than from any ambient state.
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    cookies: Arc<Jar>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            cookies,
        })
    }

    /// `Cookie` header value to present on a realtime handshake.
    ///
    /// Session cookies are usually HttpOnly, which the jar only hands out for
    /// http(s) URLs, so the lookup uses the http equivalent of `socket_url`.
    pub fn cookie_header(&self, socket_url: &Url) -> Option<String> {
        let mut lookup = socket_url.clone();
        let scheme = if socket_url.scheme() == "wss" { "https" } else { "http" };
        lookup.set_scheme(scheme).ok()?;
        let header = self.cookies.cookies(&lookup)?;
        header.to_str().ok().map(String::from)
    }

    fn csrf_token(&self) -> Option<String> {
        let header = self.cookies.cookies(&self.config.api_base)?;
        let header = header.to_str().ok()?;
        header
            .split(';')
            .map(str::trim)
            .find_map(|pair| pair.strip_prefix(CSRF_COOKIE_NAME)?.strip_prefix('='))
            .map(String::from)
    }

    async fn request(&self, method: Method, path: &str, body: RequestBody) -> Result<Option<ResponseBody>> {
        let url = self.config.endpoint(path)?;
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");

        if !is_safe(&method) {
            if let Some(token) = self.csrf_token() {
                request = request.header(CSRF_HEADER_NAME, token);
            }
        }

        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Form(form) => request.multipart(form),
        };

        debug!(%method, path, "Sending request");
        let response = request.send().await.map_err(|e| {
            warn!(%method, path, error = %e, "Request failed");
            Error::from(e)
        })?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, path, status = status.as_u16(), "Received response");

        decode_response(status, &text)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let body = self.request(Method::GET, path, RequestBody::Empty).await?;
        parse_required(body, what)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, input: &B, what: &str) -> Result<T> {
        let body = self.request(Method::POST, path, json_body(input)?).await?;
        parse_required(body, what)
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn session(&self) -> Result<Identity> {
        self.get("/api/auth/session/", "session")
            .await
            .map_err(|err| match err {
                Error::Rejected { status: 401 | 403, .. } => AuthError::NoSession.into(),
                other => other,
            })
    }

    async fn login(&self, credentials: &Credentials) -> Result<Identity> {
        self.post("/api/auth/login/", credentials, "login")
            .await
            .map_err(|err| match err {
                Error::Rejected { detail, .. } => AuthError::InvalidCredentials(detail).into(),
                other => other,
            })
    }

    async fn register(&self, credentials: &Credentials) -> Result<Identity> {
        self.post("/api/auth/register/", credentials, "registration")
            .await
            .map_err(|err| match err {
                Error::Rejected { detail, .. }
                    if detail.to_lowercase().contains("username already taken") =>
                {
                    AuthError::AccountExists.into()
                }
                Error::Rejected { detail, .. } => AuthError::InvalidCredentials(detail).into(),
                other => other,
            })
    }

    async fn logout(&self) -> Result<()> {
        self.request(Method::POST, "/api/auth/logout/", RequestBody::Empty)
            .await
            .map(|_| ())
    }

    async fn chats(&self) -> Result<Vec<ChatRecord>> {
        let body = self.request(Method::GET, "/api/chats/", RequestBody::Empty).await?;
        parse_list(body, "chat list")
    }

    async fn start_chat(&self, input: &StartChatInput) -> Result<ChatRecord> {
        self.post("/api/chats/start/", input, "chat").await
    }

    async fn start_group(&self, input: &StartGroupInput) -> Result<ChatRecord> {
        self.post("/api/chats/start-group/", input, "group chat").await
    }

    async fn messages(&self, chat_id: ChatId) -> Result<Vec<MessageRecord>> {
        let path = format!("/api/messages/?chat={chat_id}");
        let body = self.request(Method::GET, &path, RequestBody::Empty).await?;
        parse_list(body, "message list")
    }

    async fn post_message(&self, input: &SendMessageInput) -> Result<Option<MessageRecord>> {
        let body = self.request(Method::POST, "/api/messages/", json_body(input)?).await?;
        match body {
            Some(ResponseBody::Json(value)) => Ok(serde_json::from_value(value).ok()),
            _ => Ok(None),
        }
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("query", query)
            .finish();
        let body = self
            .request(Method::GET, &format!("/api/users/?{query}"), RequestBody::Empty)
            .await?;
        parse_list(body, "user search")
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<Identity> {
        let mut form = Form::new()
            .text("nickname", update.nickname.clone())
            .text("status", update.status.clone());
        if let Some(avatar) = &update.avatar {
            let part = Part::bytes(avatar.bytes.clone()).file_name(avatar.file_name.clone());
            form = form.part("avatar", part);
        }
        let body = self
            .request(Method::PATCH, "/api/profiles/me/", RequestBody::Form(form))
            .await?;
        parse_required(body, "profile")
    }
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

fn json_body<B: Serialize>(input: &B) -> Result<RequestBody> {
    serde_json::to_value(input)
        .map(RequestBody::Json)
        .map_err(|e| Error::Network(format!("cannot encode request: {e}")))
}

fn parse_required<T: DeserializeOwned>(body: Option<ResponseBody>, what: &str) -> Result<T> {
    match body {
        Some(ResponseBody::Json(value)) => serde_json::from_value(value)
            .map_err(|e| Error::Network(format!("unexpected {what} payload: {e}"))),
        Some(ResponseBody::Text(_)) => Err(Error::Network(format!("{what} response is not JSON"))),
        None => Err(Error::Network(format!("empty {what} response"))),
    }
}

/// Lists treat "no data" as empty.
fn parse_list<T: DeserializeOwned>(body: Option<ResponseBody>, what: &str) -> Result<Vec<T>> {
    match body {
        None => Ok(Vec::new()),
        body => parse_required(body, what),
    }
}
