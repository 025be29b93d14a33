use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use send_messages_module::LineMessagingClient;
use tokio::task;
use tracing::{error, info, warn};

use crate::adapters::line::LineWebhook;
use crate::clock::{Clock, SystemClock};
use crate::document_store::{DocumentStore, FirebaseDocumentStore, SqliteDocumentStore, StoreError};
use crate::gateway::{LineGateway, MessagingGateway};
use crate::link_registry::LinkRegistry;
use crate::linking::{InboundOutcome, LinkingFlow};
use crate::reminders::ReminderEvaluator;
use crate::signature::verify_line_request;

use super::chat::ChatRelay;
use super::config::{ServiceConfig, StoreBackend};
use super::scheduler::start_scheduler_thread;
use super::state::AppState;
use super::BoxError;

pub fn build_store(backend: &StoreBackend) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match backend {
        StoreBackend::Firebase {
            database_url,
            secret,
        } => Arc::new(FirebaseDocumentStore::new(database_url, secret)?),
        StoreBackend::Sqlite { path } => Arc::new(SqliteDocumentStore::new(path.clone())?),
    };
    Ok(store)
}

fn build_gateway(config: &ServiceConfig) -> LineGateway {
    let Some(token) = config.line_channel_access_token.as_deref() else {
        warn!("LINE_CHANNEL_ACCESS_TOKEN not set; outbound LINE messages are disabled");
        return LineGateway::disabled();
    };
    match LineMessagingClient::with_options(
        token,
        config.line_api_base_url.clone(),
        config.line_http_timeout,
    ) {
        Ok(client) => LineGateway::new(client),
        Err(err) => {
            warn!("failed to build LINE client, messaging disabled: {}", err);
            LineGateway::disabled()
        }
    }
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/request-code", post(request_code))
        .route("/webhook", post(line_webhook))
        .route("/api/chat", post(chat))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

pub async fn run_server(
    config: ServiceConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let config = Arc::new(config);
    let addr = config.socket_addr()?;

    let (store, gateway) = {
        let config = config.clone();
        task::spawn_blocking(move || -> Result<_, StoreError> {
            let store = build_store(&config.store)?;
            let gateway: Arc<dyn MessagingGateway> = Arc::new(build_gateway(&config));
            Ok((store, gateway))
        })
        .await
        .map_err(|err| -> BoxError { err.into() })??
    };
    if config.line_channel_secret.is_none() {
        warn!("LINE_CHANNEL_SECRET not set; every webhook will be rejected");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(LinkRegistry::new(clock.clone()));
    let linking = Arc::new(LinkingFlow::new(
        registry.clone(),
        store.clone(),
        gateway.clone(),
        clock.clone(),
    ));
    let evaluator = Arc::new(ReminderEvaluator::new(
        store.clone(),
        gateway,
        registry,
        clock,
        config.timezone,
    ));

    let mut scheduler_control = start_scheduler_thread(
        evaluator,
        store,
        config.scheduler_poll_interval,
        config.scheduler_ready_retry,
    );

    let chat_relay = ChatRelay::new(
        config.generative_api_url.clone(),
        config.generative_api_key.clone(),
    )?;
    if !chat_relay.is_configured() {
        info!("GENERATIVE_API_KEY not set; /api/chat will answer with errors");
    }
    let state = AppState::new(linking, config.line_channel_secret.clone(), chat_relay);
    let app = build_router(state, config.max_body_bytes);

    info!("reminder service listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    task::spawn_blocking(move || scheduler_control.stop_and_join())
        .await
        .map_err(|err| -> BoxError { err.into() })?;
    serve_result?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Deserialize)]
struct RequestCodeBody {
    #[serde(default)]
    email: Option<String>,
}

async fn request_code(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let email = serde_json::from_slice::<RequestCodeBody>(&body)
        .ok()
        .and_then(|body| body.email)
        .unwrap_or_default();
    match state.linking.request_code(&email) {
        Ok(code) => (StatusCode::OK, Json(json!({ "code": code }))),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        ),
    }
}

async fn line_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(reason) = verify_line_request(state.channel_secret.as_deref(), &headers, &body) {
        warn!("rejected LINE webhook: {}", reason);
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "invalid_signature"})),
        );
    }

    let webhook = match LineWebhook::parse(&body) {
        Ok(webhook) => webhook,
        Err(err) => {
            warn!("failed to parse LINE webhook: {}", err);
            return (StatusCode::OK, Json(json!({"status": "ignored"})));
        }
    };
    let Some(event) = webhook.first_event().cloned() else {
        return (StatusCode::OK, Json(json!({"status": "ignored"})));
    };

    let linking = state.linking.clone();
    let status = match task::spawn_blocking(move || linking.handle_inbound_event(&event)).await {
        Ok(InboundOutcome::Ignored) => "ignored",
        Ok(InboundOutcome::Linked { .. }) => "linked",
        Ok(InboundOutcome::Rejected) => "rejected",
        Ok(InboundOutcome::StoreFailed) => "store_failed",
        Err(err) => {
            error!("LINE event handler panicked: {}", err);
            "error"
        }
    };
    (StatusCode::OK, Json(json!({ "status": status })))
}

async fn chat(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "invalid request body"})),
            )
        }
    };
    match state.chat.forward(&payload).await {
        Ok(reply) => (StatusCode::OK, Json(reply)),
        Err(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": reason })),
        ),
    }
}
