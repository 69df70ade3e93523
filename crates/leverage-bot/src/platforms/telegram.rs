//! Telegram Bot API adapter
//!
//! Inbound updates arrive through the webhook server; this module holds the
//! configuration, the update payload types and the HTTP client used to send
//! replies and register the webhook.

use crate::error::{BotError, Result};
use crate::platforms::MessageSender;
use async_trait::async_trait;
use leverage_core::BotReply;
use leverage_utils::{EnvLookup, optional_var, parse_var, required_var};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, info};

/// Header Telegram uses to echo the webhook secret token
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 30;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram bot configuration
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from BotFather
    pub token: String,

    /// Secret shared with Telegram; also the webhook path
    pub webhook_secret: String,

    /// Public base URL the webhook is registered under
    pub webhook_url: String,

    /// Port the webhook server listens on
    pub port: u16,

    /// Bot API base URL
    pub api_base: String,

    /// Messages a single chat may send per minute
    pub rate_limit_per_minute: NonZeroU32,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"<redacted>")
            .field("webhook_secret", &"<redacted>")
            .field("webhook_url", &self.webhook_url)
            .field("port", &self.port)
            .field("api_base", &self.api_base)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .finish()
    }
}

impl TelegramConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Create config through an arbitrary variable lookup
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let token = match optional_var(lookup, "TELEGRAM_BOT_TOKEN") {
            Some(token) => token,
            None => required_var(lookup, "BOT_TOKEN").map_err(|_| {
                BotError::ConfigError("TELEGRAM_BOT_TOKEN not set".to_string())
            })?,
        };

        let config = Self {
            token,
            webhook_secret: required_var(lookup, "WEBHOOK_SECRET")?,
            webhook_url: required_var(lookup, "WEBHOOK_URL")?,
            port: parse_var(lookup, "PORT")?.unwrap_or(DEFAULT_PORT),
            api_base: optional_var(lookup, "TELEGRAM_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            rate_limit_per_minute: parse_var(lookup, "RATE_LIMIT_PER_MINUTE")?
                .or(NonZeroU32::new(DEFAULT_RATE_LIMIT_PER_MINUTE))
                .ok_or_else(|| BotError::ConfigError("invalid rate limit".to_string()))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Telegram only accepts these characters in a secret token.
        let secret_ok = (1..=256).contains(&self.webhook_secret.len())
            && self
                .webhook_secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !secret_ok {
            return Err(BotError::ConfigError(
                "WEBHOOK_SECRET must be 1-256 characters of A-Z, a-z, 0-9, _ or -".to_string(),
            ));
        }

        if self.webhook_secret == "health" {
            return Err(BotError::ConfigError(
                "WEBHOOK_SECRET must not collide with the /health route".to_string(),
            ));
        }

        if !self.webhook_url.starts_with("https://") && !self.webhook_url.starts_with("http://") {
            return Err(BotError::ConfigError(
                "WEBHOOK_URL must be an http(s) URL".to_string(),
            ));
        }

        Ok(())
    }

    /// Full URL Telegram should POST updates to
    pub fn webhook_endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.webhook_url.trim_end_matches('/'),
            self.webhook_secret
        )
    }
}

/// Incoming update (only the parts the bot reads)
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

impl Update {
    /// Chat id and text of a text message, if this update carries one
    pub fn text_message(&self) -> Option<(i64, &str)> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?;
        Some((message.chat.id, text))
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    secret_token: &'a str,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Minimal Bot API client
#[derive(Debug, Clone)]
pub struct TelegramClient {
    config: TelegramConfig,
    http: reqwest::Client,
}

impl TelegramClient {
    /// Create a new client
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { config, http })
    }

    /// Get the configuration
    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    /// Point Telegram at this bot's webhook endpoint
    pub async fn set_webhook(&self) -> Result<()> {
        let url = self.config.webhook_endpoint();
        self.call(
            "setWebhook",
            &SetWebhookRequest {
                url: &url,
                secret_token: &self.config.webhook_secret,
                allowed_updates: &["message"],
            },
        )
        .await?;
        info!(url = %self.config.webhook_url, "Webhook registered");
        Ok(())
    }

    /// Remove any existing webhook registration
    pub async fn delete_webhook(&self) -> Result<()> {
        self.call("deleteWebhook", &serde_json::json!({})).await
    }

    async fn call<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> Result<()> {
        let url = format!(
            "{}/bot{}/{method}",
            self.config.api_base.trim_end_matches('/'),
            self.config.token
        );

        let response: ApiResponse = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        if response.ok {
            debug!(method, "Telegram call succeeded");
            Ok(())
        } else {
            Err(BotError::TelegramApi {
                method: method.to_string(),
                description: response
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            })
        }
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(&self, chat_id: i64, reply: BotReply) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text: &reply.content,
            parse_mode: reply.is_markdown().then_some("Markdown"),
        };
        self.call("sendMessage", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, routing::post};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn test_config(api_base: String) -> TelegramConfig {
        TelegramConfig {
            token: "TEST_TOKEN".to_string(),
            webhook_secret: "s3cret".to_string(),
            webhook_url: "https://bot.example.com/".to_string(),
            port: 0,
            api_base,
            rate_limit_per_minute: NonZeroU32::new(5).unwrap(),
        }
    }

    #[test]
    fn test_telegram_config_from_lookup() {
        let env = vars(&[
            ("BOT_TOKEN", "123:abc"),
            ("WEBHOOK_SECRET", "s3cret_token"),
            ("WEBHOOK_URL", "https://bot.example.com"),
            ("PORT", "8443"),
        ]);
        let config = TelegramConfig::from_lookup(&|key: &str| env.get(key).cloned()).unwrap();

        assert_eq!(config.token, "123:abc");
        assert_eq!(config.port, 8443);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.rate_limit_per_minute.get(), 30);
        assert_eq!(
            config.webhook_endpoint(),
            "https://bot.example.com/s3cret_token"
        );
    }

    #[test]
    fn test_telegram_config_missing_values() {
        let env = vars(&[("WEBHOOK_SECRET", "abc"), ("WEBHOOK_URL", "https://x.io")]);
        let err = TelegramConfig::from_lookup(&|key: &str| env.get(key).cloned()).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));

        let env = vars(&[("TELEGRAM_BOT_TOKEN", "t"), ("WEBHOOK_URL", "https://x.io")]);
        let err = TelegramConfig::from_lookup(&|key: &str| env.get(key).cloned()).unwrap_err();
        assert!(err.to_string().contains("WEBHOOK_SECRET"));
    }

    #[test]
    fn test_telegram_config_rejects_bad_secret() {
        let mut config = test_config(DEFAULT_API_BASE.to_string());
        config.webhook_secret = "has spaces/slash".to_string();
        assert!(config.validate().is_err());

        config.webhook_secret = "health".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", test_config(DEFAULT_API_BASE.to_string()));
        assert!(!rendered.contains("TEST_TOKEN"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_update_text_message() {
        let update: Update = serde_json::from_str(
            r#"{"update_id": 7, "message": {"message_id": 1, "chat": {"id": 42, "type": "private"},
                "from": {"id": 42, "is_bot": false, "first_name": "A"}, "text": "100"}}"#,
        )
        .unwrap();
        assert_eq!(update.text_message(), Some((42, "100")));

        let update: Update =
            serde_json::from_str(r#"{"update_id": 8, "edited_message": {}}"#).unwrap();
        assert_eq!(update.text_message(), None);
    }

    #[tokio::test]
    async fn test_send_message_posts_to_bot_api() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/botTEST_TOKEN/sendMessage",
                post(
                    |State(seen): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        seen.lock().unwrap().push(body);
                        Json(serde_json::json!({"ok": true, "result": {}}))
                    },
                ),
            )
            .with_state(Arc::clone(&seen));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let client = TelegramClient::new(test_config(format!("http://{addr}"))).unwrap();
        client
            .send_message(42, BotReply::formatted("*hi*"))
            .await
            .unwrap();
        client.send_message(42, BotReply::text("plain")).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0]["chat_id"], 42);
        assert_eq!(seen[0]["text"], "*hi*");
        assert_eq!(seen[0]["parse_mode"], "Markdown");
        assert!(seen[1].get("parse_mode").is_none());
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let app = Router::new().route(
            "/botTEST_TOKEN/sendMessage",
            post(|| async {
                Json(serde_json::json!({"ok": false, "description": "Forbidden: bot was blocked"}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let client = TelegramClient::new(test_config(format!("http://{addr}"))).unwrap();
        let err = client
            .send_message(42, BotReply::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::TelegramApi { .. }));
        assert!(err.to_string().contains("blocked"));
    }
}
