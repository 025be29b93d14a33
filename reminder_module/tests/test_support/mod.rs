#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use reminder_module::service::{build_router, AppState, ChatRelay, DEFAULT_MAX_BODY_BYTES};
use reminder_module::{
    LinkRegistry, LinkingFlow, ManualClock, MessagingGateway, SqliteDocumentStore,
};
use tempfile::TempDir;
use tokio::sync::oneshot;

pub const CHANNEL_SECRET: &str = "line-channel-secret";

#[derive(Default)]
pub struct RecordingGateway {
    pub pushes: Mutex<Vec<(String, String)>>,
    pub replies: Mutex<Vec<(String, String)>>,
}

impl RecordingGateway {
    pub fn pushes(&self) -> Vec<(String, String)> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<(String, String)> {
        self.replies.lock().unwrap().clone()
    }
}

impl MessagingGateway for RecordingGateway {
    fn push(&self, user_id: &str, text: &str) {
        self.pushes
            .lock()
            .unwrap()
            .push((user_id.to_string(), text.to_string()));
    }

    fn reply(&self, reply_token: &str, text: &str) {
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.to_string(), text.to_string()));
    }
}

pub struct TestService {
    pub base_url: String,
    pub store: Arc<SqliteDocumentStore>,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<RecordingGateway>,
    pub registry: Arc<LinkRegistry>,
    shutdown: Option<oneshot::Sender<()>>,
    _temp: TempDir,
}

impl Drop for TestService {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub struct ServiceOptions {
    pub channel_secret: Option<String>,
    pub chat: ChatRelay,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            channel_secret: Some(CHANNEL_SECRET.to_string()),
            chat: ChatRelay::new("http://127.0.0.1:9/unused", None).expect("chat relay"),
        }
    }
}

pub async fn spawn_service(options: ServiceOptions) -> TestService {
    let temp = TempDir::new().expect("tempdir");
    let store = Arc::new(SqliteDocumentStore::new(temp.path().join("docs.db")).expect("store"));
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
    ));
    let gateway = Arc::new(RecordingGateway::default());
    let registry = Arc::new(LinkRegistry::new(clock.clone()));
    let linking = Arc::new(LinkingFlow::new(
        registry.clone(),
        store.clone(),
        gateway.clone(),
        clock.clone(),
    ));
    let state = AppState::new(linking, options.channel_secret, options.chat);
    let app = build_router(state, DEFAULT_MAX_BODY_BYTES);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    TestService {
        base_url: format!("http://{}", addr),
        store,
        clock,
        gateway,
        registry,
        shutdown: Some(shutdown_tx),
        _temp: temp,
    }
}

pub fn text_webhook(text: &str, user_id: &str) -> String {
    serde_json::json!({
        "destination": "Ubot",
        "events": [{
            "type": "message",
            "replyToken": "reply-token-1",
            "timestamp": 1714521600000i64,
            "mode": "active",
            "source": {"type": "user", "userId": user_id},
            "message": {"id": "m-1", "type": "text", "text": text}
        }]
    })
    .to_string()
}
