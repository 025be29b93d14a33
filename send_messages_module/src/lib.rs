//! Blocking client for the LINE Messaging API.
//!
//! Only the two calls the reminder service needs are covered:
//! - `push_text`: send to a user id outside any conversation
//! - `reply_text`: answer an inbound event through its one-shot reply token

use std::env;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "https://api.line.me";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Upper bound the platform accepts for a single text message.
pub const MAX_TEXT_CHARS: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum SendMessageError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LINE API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

#[derive(Debug, Clone)]
pub struct LineMessagingClient {
    channel_access_token: String,
    api_base_url: String,
    http: reqwest::blocking::Client,
}

impl LineMessagingClient {
    pub fn new(channel_access_token: impl Into<String>) -> Result<Self, SendMessageError> {
        Self::with_options(
            channel_access_token,
            DEFAULT_API_BASE_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_options(
        channel_access_token: impl Into<String>,
        api_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SendMessageError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            channel_access_token: channel_access_token.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Build a client from `LINE_CHANNEL_ACCESS_TOKEN`, honoring
    /// `LINE_API_BASE_URL` and `LINE_HTTP_TIMEOUT_SECS` when set.
    pub fn from_env() -> Result<Self, SendMessageError> {
        dotenvy::dotenv().ok();
        let token = env::var("LINE_CHANNEL_ACCESS_TOKEN")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(SendMessageError::MissingEnv("LINE_CHANNEL_ACCESS_TOKEN"))?;
        let base_url = env::var("LINE_API_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let timeout = env::var("LINE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::with_options(token.trim(), base_url, Duration::from_secs(timeout))
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn push_text(&self, to: &str, text: &str) -> Result<(), SendMessageError> {
        if to.trim().is_empty() {
            return Err(SendMessageError::InvalidArgument("empty recipient"));
        }
        let request = PushRequest {
            to,
            messages: vec![TextMessage::new(text)],
        };
        self.post("/v2/bot/message/push", &request)?;
        debug!("LINE push delivered to {}", to);
        Ok(())
    }

    pub fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), SendMessageError> {
        if reply_token.trim().is_empty() {
            return Err(SendMessageError::InvalidArgument("empty reply token"));
        }
        let request = ReplyRequest {
            reply_token,
            messages: vec![TextMessage::new(text)],
        };
        self.post("/v2/bot/message/reply", &request)?;
        debug!("LINE reply delivered");
        Ok(())
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), SendMessageError> {
        let url = format!("{}{}", self.api_base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .json(body)
            .send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(SendMessageError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: Vec<TextMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage>,
}

#[derive(Debug, Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl TextMessage {
    fn new(text: &str) -> Self {
        Self {
            kind: "text",
            text: truncate_chars(text, MAX_TEXT_CHARS),
        }
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
