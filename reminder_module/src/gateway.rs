//! Outbound messaging with failures contained.
//!
//! A failed push must never abort a reminder sweep, so neither operation
//! returns an error: problems are logged and the caller moves on.

use send_messages_module::LineMessagingClient;
use tracing::{debug, info, warn};

pub trait MessagingGateway: Send + Sync {
    /// Send `text` to a user outside any reply context.
    fn push(&self, user_id: &str, text: &str);

    /// Answer an inbound event through its one-shot reply token.
    fn reply(&self, reply_token: &str, text: &str);
}

#[derive(Debug, Clone, Default)]
pub struct LineGateway {
    client: Option<LineMessagingClient>,
}

impl LineGateway {
    pub fn new(client: LineMessagingClient) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Gateway for a deployment without a channel access token.
    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }
}

impl MessagingGateway for LineGateway {
    fn push(&self, user_id: &str, text: &str) {
        let Some(client) = self.client.as_ref() else {
            debug!("LINE push skipped for {}: messaging not configured", user_id);
            return;
        };
        match client.push_text(user_id, text) {
            Ok(()) => info!("LINE push sent to {}", user_id),
            Err(err) => warn!("LINE push to {} failed: {}", user_id, err),
        }
    }

    fn reply(&self, reply_token: &str, text: &str) {
        let Some(client) = self.client.as_ref() else {
            debug!("LINE reply skipped: messaging not configured");
            return;
        };
        if let Err(err) = client.reply_text(reply_token, text) {
            warn!("LINE reply failed: {}", err);
        }
    }
}
