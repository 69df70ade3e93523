//! Webhook HTTP server
//!
//! Telegram posts each update to `POST /{secret}` with the same secret echoed
//! in the `X-Telegram-Bot-Api-Secret-Token` header. Requests failing either
//! check are rejected with 403 before the payload is parsed or the bot sees it.

use crate::error::Result;
use crate::platforms::MessageSender;
use crate::platforms::telegram::{SECRET_TOKEN_HEADER, Update};
use crate::rate_limit::SenderRateLimiter;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use leverage_core::{BotReply, LeverageBot, SessionStore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often idle sessions are swept
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const INDEX_TEXT: &str = "Bot is running and healthy! 🚀";
const THROTTLED_TEXT: &str = "⏳ You're sending messages too quickly. Please wait a moment and try again.";

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<LeverageBot>,
    pub sender: Arc<dyn MessageSender>,
    pub limiter: Arc<SenderRateLimiter>,
    pub webhook_secret: Arc<str>,
}

impl AppState {
    pub fn new(
        bot: Arc<LeverageBot>,
        sender: Arc<dyn MessageSender>,
        limiter: Arc<SenderRateLimiter>,
        webhook_secret: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            bot,
            sender,
            limiter,
            webhook_secret: webhook_secret.into(),
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub active_sessions: usize,
}

/// Build the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/{secret}", post(webhook_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler() -> &'static str {
    INDEX_TEXT
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_sessions = state.bot.store().active_count().unwrap_or_else(|e| {
        warn!(error = %e, "Could not count sessions");
        0
    });

    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        active_sessions,
    })
}

/// Handle one Telegram update
///
/// Replies are sent through the Bot API rather than in the HTTP response.
/// Delivery failures are logged and still answered with 200 so Telegram does
/// not redeliver an update whose transition has already been applied.
async fn webhook_handler(
    State(state): State<AppState>,
    Path(path_secret): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let header_secret = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    let authorized = header_secret.is_some_and(|header| {
        secrets_match(header, &state.webhook_secret) && secrets_match(&path_secret, &state.webhook_secret)
    });
    if !authorized {
        warn!("Rejected webhook request with a bad secret");
        return (StatusCode::FORBIDDEN, "forbidden");
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Malformed update payload");
            return (StatusCode::BAD_REQUEST, "bad request");
        }
    };

    let Some((chat_id, text)) = update.text_message() else {
        debug!(update_id = update.update_id, "Ignoring update without text");
        return (StatusCode::OK, "ok");
    };

    let sender_id = chat_id.to_string();
    let reply = if state.limiter.check(&sender_id) {
        state.bot.process_input(&sender_id, text)
    } else {
        warn!(chat_id, "Rate limit exceeded");
        BotReply::error(THROTTLED_TEXT)
    };

    if let Err(e) = state.sender.send_message(chat_id, reply).await {
        error!(chat_id, error = %e, "Failed to deliver reply");
    }

    (StatusCode::OK, "ok")
}

/// Compare two secrets by digest so the comparison time does not depend on
/// the position of the first differing byte
fn secrets_match(candidate: &str, expected: &str) -> bool {
    Sha256::digest(candidate.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// Periodically purge idle sessions and stale rate-limit buckets
pub fn spawn_session_sweeper(
    store: Arc<SessionStore>,
    limiter: Arc<SenderRateLimiter>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.purge_expired() {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged idle sessions"),
                Err(e) => error!(error = %e, "Session sweep failed"),
            }
            limiter.retain_recent();
        }
    })
}

/// Run the webhook server until Ctrl-C
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let store = Arc::clone(state.bot.store());
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = store.clear() {
        warn!(error = %e, "Could not clear sessions on shutdown");
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::MockMessageSender;
    use axum::body::Body;
    use axum::http::Request;
    use leverage_core::WizardConfig;
    use std::num::NonZeroU32;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const SECRET: &str = "s3cret_path";

    fn state_with(sender: MockMessageSender, per_minute: u32) -> AppState {
        AppState::new(
            Arc::new(LeverageBot::new(WizardConfig::default())),
            Arc::new(sender),
            Arc::new(SenderRateLimiter::per_minute(NonZeroU32::new(per_minute).unwrap())),
            SECRET,
        )
    }

    fn update_json(chat_id: i64, text: &str) -> String {
        serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 7,
                "chat": { "id": chat_id },
                "from": { "id": chat_id, "username": "trader" },
                "text": text,
            }
        })
        .to_string()
    }

    fn webhook_request(path_secret: &str, header: Option<&str>, body: String) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/{path_secret}"))
            .header("content-type", "application/json");
        if let Some(header) = header {
            builder = builder.header(SECRET_TOKEN_HEADER, header);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn recording_sender() -> (MockMessageSender, Arc<Mutex<Vec<(i64, BotReply)>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&sent);
        let mut sender = MockMessageSender::new();
        sender.expect_send_message().returning(move |chat_id, reply| {
            log.lock().unwrap().push((chat_id, reply));
            Ok(())
        });
        (sender, sent)
    }

    #[tokio::test]
    async fn test_missing_secret_header_is_forbidden() {
        let mut sender = MockMessageSender::new();
        sender.expect_send_message().never();
        let app = create_router(state_with(sender, 30));

        let response = app
            .oneshot(webhook_request(SECRET, None, update_json(42, "/start")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_wrong_path_secret_is_forbidden() {
        let mut sender = MockMessageSender::new();
        sender.expect_send_message().never();
        let app = create_router(state_with(sender, 30));

        let response = app
            .oneshot(webhook_request("guess", Some(SECRET), update_json(42, "/start")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_start_sends_welcome() {
        let (sender, sent) = recording_sender();
        let state = state_with(sender, 30);
        let bot = Arc::clone(&state.bot);
        let app = create_router(state);

        let response = app
            .oneshot(webhook_request(SECRET, Some(SECRET), update_json(42, "/start")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 42);
        assert!(sent[0].1.content.contains("Welcome"));
        assert_eq!(
            bot.state_of("42"),
            Some(leverage_core::WizardState::AwaitingEntry)
        );
    }

    #[tokio::test]
    async fn test_full_conversation_over_webhook() {
        let (sender, sent) = recording_sender();
        let app = create_router(state_with(sender, 30));

        for text in ["/start", "100", "90", "50"] {
            let response = app
                .clone()
                .oneshot(webhook_request(SECRET, Some(SECRET), update_json(7, text)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 4);
        assert!(sent[3].1.content.contains("Required Leverage: 10.00x"));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let mut sender = MockMessageSender::new();
        sender.expect_send_message().never();
        let app = create_router(state_with(sender, 30));

        let response = app
            .oneshot(webhook_request(SECRET, Some(SECRET), "{not json".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_without_text_is_ignored() {
        let mut sender = MockMessageSender::new();
        sender.expect_send_message().never();
        let app = create_router(state_with(sender, 30));

        let body = serde_json::json!({
            "update_id": 3,
            "message": { "message_id": 1, "chat": { "id": 42 } }
        })
        .to_string();
        let response = app
            .oneshot(webhook_request(SECRET, Some(SECRET), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_send_failure_still_acknowledged() {
        let mut sender = MockMessageSender::new();
        sender.expect_send_message().times(1).returning(|_, _| {
            Err(crate::error::BotError::TelegramApi {
                method: "sendMessage".to_string(),
                description: "Forbidden: bot was blocked by the user".to_string(),
            })
        });
        let app = create_router(state_with(sender, 30));

        let response = app
            .oneshot(webhook_request(SECRET, Some(SECRET), update_json(42, "/help")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limited_sender_is_throttled() {
        let (sender, sent) = recording_sender();
        let state = state_with(sender, 1);
        let bot = Arc::clone(&state.bot);
        let app = create_router(state);

        for text in ["/start", "100"] {
            app.clone()
                .oneshot(webhook_request(SECRET, Some(SECRET), update_json(42, text)))
                .await
                .unwrap();
        }

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].1.is_error());
        assert!(sent[1].1.content.contains("too quickly"));
        // The throttled value was not applied.
        assert_eq!(
            bot.state_of("42"),
            Some(leverage_core::WizardState::AwaitingEntry)
        );
    }

    #[tokio::test]
    async fn test_health_reports_sessions() {
        let state = state_with(MockMessageSender::new(), 30);
        state.bot.process_input("1", "/start");
        state.bot.process_input("2", "/start");
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["active_sessions"], 2);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_health_ignores_expired_sessions() {
        let state = state_with(MockMessageSender::new(), 30);
        state
            .bot
            .process_input_at("1", "/start", Utc::now() - chrono::Duration::hours(2));
        state.bot.process_input("2", "/start");
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["active_sessions"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_idle_sessions_and_buckets() {
        let store = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let bot = LeverageBot::with_store(Arc::clone(&store), WizardConfig::default());
        let stale = Utc::now() - chrono::Duration::minutes(5);
        bot.process_input_at("1", "/start", stale);
        bot.process_input_at("2", "/start", stale);
        assert_eq!(store.lock().unwrap().len(), 2);

        let limiter = Arc::new(SenderRateLimiter::per_minute(
            NonZeroU32::new(60_000).unwrap(),
        ));
        assert!(limiter.check("1"));
        assert!(limiter.check("2"));
        assert_eq!(limiter.tracked(), 2);
        // Buckets refill in 1ms of wall-clock time, which the paused runtime does not control.
        std::thread::sleep(Duration::from_millis(20));

        let sweeper =
            spawn_session_sweeper(Arc::clone(&store), Arc::clone(&limiter), SWEEP_INTERVAL);
        tokio::time::sleep(SWEEP_INTERVAL + Duration::from_secs(1)).await;

        assert_eq!(store.lock().unwrap().len(), 0);
        assert_eq!(limiter.tracked(), 0);
        sweeper.abort();
    }

    #[tokio::test]
    async fn test_index() {
        let app = create_router(state_with(MockMessageSender::new(), 30));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("abc", "abc"));
        assert!(!secrets_match("abc", "abd"));
        assert!(!secrets_match("", "abc"));
    }
}
