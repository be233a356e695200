//! # Notification delivery
//!
//! The monitor hands every qualifying listing to a [`Notifier`] as an already
//! rendered text message. Two implementations live here:
//!
//! - [`TelegramNotifier`] posts to the Telegram Bot API `sendMessage` method,
//!   using the watch's user id as the chat id.
//! - [`LogNotifier`] only logs the message. It is used when `TELEGRAM_TOKEN` is
//!   not configured so the monitor still runs (and still records what it would
//!   have sent).
//!
//! ## Message shape
//!
//! ```text
//! <title>
//!
//! Price: <price or "unknown">
//! Site: <site>
//! Link: <url>
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use crate::error::NotifyError;
use crate::models::{TelegramMessage, TelegramResponse};
use crate::traits::Notifier;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram Bot API client.
///
/// Holds a reusable `reqwest::Client`, so clones share one connection pool.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_api_base(token, TELEGRAM_API)
    }

    /// Points the client at a different Bot API host (self-hosted server or a test double).
    pub fn with_api_base(token: impl Into<String>, api_base: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: &str, text: &str) -> Result<(), NotifyError> {
        let message = TelegramMessage {
            chat_id: user_id,
            text,
            disable_web_page_preview: false,
        };

        let response = self
            .client
            .post(self.send_message_url())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        let body: Option<TelegramResponse> = response.json().await.ok();

        match body {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => {
                info!("Telegram notification sent to {}", user_id);
                Ok(())
            }
            other => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: other
                    .and_then(|b| b.description)
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

impl Clone for TelegramNotifier {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_base: self.api_base.clone(),
            token: self.token.clone(),
        }
    }
}

/// Stand-in used when no delivery transport is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: &str, text: &str) -> Result<(), NotifyError> {
        info!("Notification for {} (delivery disabled):\n{}", user_id, text);
        Ok(())
    }
}

/// Telegram when a token is configured, log-only otherwise.
pub fn build_notifier(token: Option<&str>) -> Result<Arc<dyn Notifier>> {
    match token {
        Some(token) => Ok(Arc::new(TelegramNotifier::new(token)?)),
        None => {
            warn!("TELEGRAM_TOKEN not set - notifications will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Answers one request with `body` and hands back the raw request text.
    async fn fake_bot_api(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            tx.send(String::from_utf8_lossy(&request).into_owned()).ok();
        });

        (format!("http://{addr}"), rx)
    }

    #[tokio::test]
    async fn posts_chat_id_and_text() {
        let (base, request) = fake_bot_api("200 OK", r#"{"ok":true,"result":{}}"#).await;
        let notifier = TelegramNotifier::with_api_base("123:abc", &base).unwrap();

        notifier.notify("4242", "hello").await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /bot123:abc/sendMessage"));
        assert!(request.contains(r#""chat_id":"4242""#));
        assert!(request.contains(r#""text":"hello""#));
    }

    #[tokio::test]
    async fn api_refusal_is_a_notify_error() {
        let (base, _request) = fake_bot_api(
            "403 Forbidden",
            r#"{"ok":false,"description":"Forbidden: bot was blocked by the user"}"#,
        )
        .await;
        let notifier = TelegramNotifier::with_api_base("t", &base).unwrap();

        let err = notifier.notify("1", "x").await.unwrap_err();

        match err {
            NotifyError::Rejected {
                status,
                description,
            } => {
                assert_eq!(status, 403);
                assert!(description.contains("blocked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.notify("1", "text").await.is_ok());
    }
}
