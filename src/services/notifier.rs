use reqwest::Client as HttpClient;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Outbound messaging channel for scheduled digests
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> AppResult<()>;
}

/// Sends messages through the Telegram Bot API `sendMessage` method
pub struct TelegramNotifier {
    http_client: HttpClient,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self::with_api_url("https://api.telegram.org".to_string(), bot_token, chat_id)
    }

    pub fn with_api_url(api_url: String, bot_token: String, chat_id: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
            bot_token,
            chat_id,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> AppResult<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": message,
                "disable_web_page_preview": true,
            }))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            // The request URL embeds the bot token
            .map_err(|e| {
                AppError::UpstreamNotifier(format!("Telegram send failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamNotifier(format!(
                "Telegram API returned status {}: {}",
                status, body
            )));
        }

        tracing::info!(chat_id = %self.chat_id, chars = message.len(), "Telegram message sent");
        Ok(())
    }
}

/// Stand-in used when no messaging channel is configured
///
/// Every send fails, so a day with events surfaces as a failed sub-job
/// instead of silently dropping the digest.
pub struct UnconfiguredNotifier;

#[async_trait::async_trait]
impl Notifier for UnconfiguredNotifier {
    async fn send(&self, _message: &str) -> AppResult<()> {
        Err(AppError::UpstreamNotifier(
            "No notifier configured (set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_notifier_fails() {
        let err = UnconfiguredNotifier.send("hello").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamNotifier(_)));
    }

    #[tokio::test]
    async fn test_unreachable_telegram_is_upstream_error() {
        let notifier = TelegramNotifier::with_api_url(
            "http://127.0.0.1:9".to_string(),
            "token".to_string(),
            "42".to_string(),
        );
        let err = notifier.send("hello").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamNotifier(_)));
    }

    #[tokio::test]
    async fn test_send_failure_hides_bot_token() {
        let notifier = TelegramNotifier::with_api_url(
            "http://127.0.0.1:9".to_string(),
            "123456:SECRET-BOT-TOKEN".to_string(),
            "42".to_string(),
        );
        let err = notifier.send("hello").await.unwrap_err();

        assert!(!err.to_string().contains("SECRET-BOT-TOKEN"));
        assert!(!format!("{:?}", err).contains("SECRET-BOT-TOKEN"));
    }
}
