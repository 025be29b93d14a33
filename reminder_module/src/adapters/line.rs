//! LINE webhook payloads.
//!
//! Only the fields the linking flow reads are modeled; everything else in the
//! envelope is ignored by serde.

use serde::Deserialize;

/// Webhook request body sent by the LINE platform.
#[derive(Debug, Clone, Deserialize)]
pub struct LineWebhook {
    /// Bot user id that received the events
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<LineEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    /// "message", "follow", "join", "postback", ...
    #[serde(rename = "type")]
    pub event_type: String,
    /// One-shot token for answering this event
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<LineSource>,
    #[serde(default)]
    pub message: Option<LineMessage>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSource {
    /// "user", "group" or "room"
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineMessage {
    #[serde(default)]
    pub id: Option<String>,
    /// "text", "image", "sticker", ...
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl LineWebhook {
    pub fn parse(raw_payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw_payload)
    }

    pub fn first_event(&self) -> Option<&LineEvent> {
        self.events.first()
    }
}

impl LineEvent {
    /// Text body when this is a plain text message event.
    pub fn text(&self) -> Option<&str> {
        if self.event_type != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.message_type != "text" {
            return None;
        }
        message.text.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.source
            .as_ref()
            .and_then(|source| source.user_id.as_deref())
            .filter(|value| !value.trim().is_empty())
    }

    pub fn reply_token(&self) -> Option<&str> {
        self.reply_token
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }
}
