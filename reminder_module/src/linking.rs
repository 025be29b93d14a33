use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::adapters::line::LineEvent;
use crate::clock::Clock;
use crate::document_store::{join_path, DocumentStore};
use crate::gateway::MessagingGateway;
use crate::link_registry::LinkRegistry;
use crate::reminders::{LinkRecord, LINKS_ROOT};

const LINK_COMMAND: &str = "LINK ";
pub const INVALID_CODE_REPLY: &str = "❌ invalid or expired code";
pub const STORE_FAILURE_REPLY: &str = "⚠️ could not save the link, please try again";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkingError {
    #[error("email is required")]
    MissingEmail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Not a link command; nothing was replied or mutated.
    Ignored,
    Linked { email: String },
    Rejected,
    StoreFailed,
}

/// Store key for an identity. Realtime-database keys may not contain `.`.
pub fn sanitize_identity(identity: &str) -> String {
    identity.trim().replace('.', "_")
}

pub struct LinkingFlow {
    registry: Arc<LinkRegistry>,
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn MessagingGateway>,
    clock: Arc<dyn Clock>,
}

impl LinkingFlow {
    pub fn new(
        registry: Arc<LinkRegistry>,
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn MessagingGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            store,
            gateway,
            clock,
        }
    }

    pub fn registry(&self) -> &Arc<LinkRegistry> {
        &self.registry
    }

    pub fn request_code(&self, email: &str) -> Result<String, LinkingError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(LinkingError::MissingEmail);
        }
        let code = self.registry.issue(email);
        info!("issued link code for {}", email);
        Ok(code)
    }

    pub fn handle_inbound_event(&self, event: &LineEvent) -> InboundOutcome {
        let Some(text) = event.text() else {
            debug!("ignoring LINE event type={}", event.event_type);
            return InboundOutcome::Ignored;
        };
        let Some(code) = parse_link_command(text) else {
            debug!("ignoring non-link text message");
            return InboundOutcome::Ignored;
        };

        let now = self.clock.now();
        let email = match self.registry.redeem(code, now) {
            Ok(email) => email,
            Err(err) => {
                info!("link code rejected: {}", err);
                self.reply(event, INVALID_CODE_REPLY);
                return InboundOutcome::Rejected;
            }
        };

        let Some(user_id) = event.user_id() else {
            warn!("link command for {} carried no user id", email);
            self.reply(event, INVALID_CODE_REPLY);
            return InboundOutcome::Rejected;
        };

        let record = LinkRecord {
            external_user_id: user_id.to_string(),
            linked_at: Some(now),
        };
        let path = join_path(LINKS_ROOT, &sanitize_identity(&email));
        let persisted = serde_json::to_value(&record)
            .map_err(|err| err.to_string())
            .and_then(|value: Value| self.store.set(&path, &value).map_err(|err| err.to_string()));
        if let Err(err) = persisted {
            error!("failed to persist link {}: {}", path, err);
            self.reply(event, STORE_FAILURE_REPLY);
            return InboundOutcome::StoreFailed;
        }

        info!("linked {} to LINE user {}", email, user_id);
        self.reply(event, &format!("✅ linked to {}", email));
        InboundOutcome::Linked { email }
    }

    fn reply(&self, event: &LineEvent, text: &str) {
        match event.reply_token() {
            Some(token) => self.gateway.reply(token, text),
            None => debug!("no reply token on event; dropping reply"),
        }
    }
}

fn parse_link_command(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let prefix = text.get(..LINK_COMMAND.len())?;
    if !prefix.eq_ignore_ascii_case(LINK_COMMAND) {
        return None;
    }
    Some(text[LINK_COMMAND.len()..].trim())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Map};
    use tempfile::TempDir;

    use super::*;
    use crate::adapters::line::LineWebhook;
    use crate::clock::ManualClock;
    use crate::document_store::{SqliteDocumentStore, StoreError};

    #[derive(Default)]
    struct RecordingGateway {
        replies: Mutex<Vec<(String, String)>>,
    }

    impl MessagingGateway for RecordingGateway {
        fn push(&self, _user_id: &str, _text: &str) {}

        fn reply(&self, reply_token: &str, text: &str) {
            self.replies
                .lock()
                .unwrap()
                .push((reply_token.to_string(), text.to_string()));
        }
    }

    struct BrokenStore;

    impl DocumentStore for BrokenStore {
        fn get(&self, _path: &str) -> Result<Option<Value>, StoreError> {
            Ok(None)
        }
        fn set(&self, _path: &str, _value: &Value) -> Result<(), StoreError> {
            Err(StoreError::Status {
                status: 500,
                body: "down".to_string(),
            })
        }
        fn update(&self, _path: &str, _fields: &Map<String, Value>) -> Result<(), StoreError> {
            Ok(())
        }
        fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct Fixture {
        _temp: TempDir,
        store: Arc<SqliteDocumentStore>,
        clock: Arc<ManualClock>,
        gateway: Arc<RecordingGateway>,
        flow: LinkingFlow,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().expect("tempdir");
        let store = Arc::new(SqliteDocumentStore::new(temp.path().join("docs.db")).expect("store"));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap(),
        ));
        let gateway = Arc::new(RecordingGateway::default());
        let registry = Arc::new(LinkRegistry::new(clock.clone()));
        let flow = LinkingFlow::new(registry, store.clone(), gateway.clone(), clock.clone());
        Fixture {
            _temp: temp,
            store,
            clock,
            gateway,
            flow,
        }
    }

    fn text_event(text: &str, user_id: Option<&str>) -> LineEvent {
        let mut source = json!({"type": "user"});
        if let Some(user_id) = user_id {
            source["userId"] = json!(user_id);
        }
        let raw = json!({"events": [{
            "type": "message",
            "replyToken": "rt-1",
            "source": source,
            "message": {"id": "m1", "type": "text", "text": text}
        }]});
        let webhook = LineWebhook::parse(raw.to_string().as_bytes()).expect("parse");
        webhook.events[0].clone()
    }

    #[test]
    fn request_code_requires_email() {
        let f = fixture();
        assert_eq!(f.flow.request_code("   "), Err(LinkingError::MissingEmail));
        assert_eq!(f.flow.registry().pending_count(), 0);
    }

    #[test]
    fn link_command_binds_identity_and_replies() {
        let f = fixture();
        let code = f.flow.request_code(" alice@example.com ").expect("code");

        let outcome = f
            .flow
            .handle_inbound_event(&text_event(&format!("link  {} ", code), Some("U-alice")));
        assert_eq!(
            outcome,
            InboundOutcome::Linked {
                email: "alice@example.com".to_string()
            }
        );

        let stored = f.store.get("links/alice@example_com").unwrap().unwrap();
        assert_eq!(stored["externalUserId"], "U-alice");
        assert_eq!(stored["linkedAt"], "2024-05-01T02:00:00Z");
        assert_eq!(
            f.gateway.replies.lock().unwrap().as_slice(),
            &[("rt-1".to_string(), "✅ linked to alice@example.com".to_string())]
        );
        assert_eq!(f.flow.registry().pending_count(), 0);
    }

    #[test]
    fn unknown_or_expired_code_is_rejected() {
        let f = fixture();
        let code = f.flow.request_code("a@x.com").expect("code");
        f.clock.advance(Duration::minutes(5));

        let outcome = f
            .flow
            .handle_inbound_event(&text_event(&format!("LINK {}", code), Some("U1")));
        assert_eq!(outcome, InboundOutcome::Rejected);
        assert_eq!(
            f.gateway.replies.lock().unwrap()[0].1,
            INVALID_CODE_REPLY.to_string()
        );
        assert!(f.store.get("links").unwrap().is_none());
    }

    #[test]
    fn missing_user_id_replies_invalid() {
        let f = fixture();
        let code = f.flow.request_code("a@x.com").expect("code");
        let outcome = f
            .flow
            .handle_inbound_event(&text_event(&format!("LINK {}", code), None));
        assert_eq!(outcome, InboundOutcome::Rejected);
        assert!(f.store.get("links").unwrap().is_none());
    }

    #[test]
    fn other_text_and_stickers_are_ignored() {
        let f = fixture();
        f.flow.request_code("a@x.com").expect("code");

        assert_eq!(
            f.flow.handle_inbound_event(&text_event("hello there", Some("U1"))),
            InboundOutcome::Ignored
        );
        assert_eq!(
            f.flow.handle_inbound_event(&text_event("LINKED", Some("U1"))),
            InboundOutcome::Ignored
        );

        let sticker = LineWebhook::parse(
            br#"{"events":[{"type":"message","replyToken":"rt",
                "source":{"type":"user","userId":"U1"},
                "message":{"id":"m","type":"sticker"}}]}"#,
        )
        .expect("parse");
        assert_eq!(
            f.flow.handle_inbound_event(&sticker.events[0]),
            InboundOutcome::Ignored
        );

        assert!(f.gateway.replies.lock().unwrap().is_empty());
        assert_eq!(f.flow.registry().pending_count(), 1);
    }

    #[test]
    fn store_failure_is_reported() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gateway = Arc::new(RecordingGateway::default());
        let registry = Arc::new(LinkRegistry::new(clock.clone()));
        let flow = LinkingFlow::new(registry, Arc::new(BrokenStore), gateway.clone(), clock);
        let code = flow.request_code("a@x.com").expect("code");

        let outcome = flow.handle_inbound_event(&text_event(&format!("LINK {}", code), Some("U1")));
        assert_eq!(outcome, InboundOutcome::StoreFailed);
        assert_eq!(
            gateway.replies.lock().unwrap()[0].1,
            STORE_FAILURE_REPLY.to_string()
        );
    }

    #[test]
    fn sanitize_replaces_dots() {
        assert_eq!(sanitize_identity("a.b@c.com"), "a_b@c_com");
    }

    #[test]
    fn parse_link_command_handles_case_and_whitespace() {
        assert_eq!(parse_link_command("LINK 123456"), Some("123456"));
        assert_eq!(parse_link_command("  Link   123456  "), Some("123456"));
        assert_eq!(parse_link_command("LINK"), None);
        assert_eq!(parse_link_command("LIN"), None);
        assert_eq!(parse_link_command("é"), None);
    }
}
