use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::NotificationChannel;
use crate::config::TelegramConfig;
use crate::error::DigestError;

/// Telegram Bot API sender
pub struct TelegramChannel {
    client: Client,
    send_url: String,
    chat_id: String,
    parse_mode: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self, DigestError> {
        let token = non_empty(config.bot_token.as_deref()).ok_or_else(|| {
            DigestError::Configuration("TELEGRAM_BOT_TOKEN is not configured".into())
        })?;
        let chat_id = non_empty(config.chat_id.as_deref()).ok_or_else(|| {
            DigestError::Configuration("TELEGRAM_CHAT_ID is not configured".into())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DigestError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            send_url: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                token
            ),
            chat_id: chat_id.to_string(),
            parse_mode: config.parse_mode.clone(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    #[instrument(skip(self, text), fields(chat_id = %self.chat_id, chars = text.len()))]
    async fn send(&self, text: &str) -> Result<(), DigestError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: &self.parse_mode,
        };

        debug!("Sending Telegram message");

        // The bot token is part of the URL, so it is stripped from transport errors.
        let response = self
            .client
            .post(&self.send_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DigestError::Delivery("Telegram API request timed out".into())
                } else {
                    DigestError::Delivery(format!(
                        "Telegram API request failed: {}",
                        e.without_url()
                    ))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<TelegramResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let detail = parsed
                .and_then(|r| r.description)
                .unwrap_or(body);
            return Err(DigestError::Delivery(format!(
                "Telegram API request failed ({}): {}",
                status, detail
            )));
        }

        // Telegram can answer 200 for logical errors
        match parsed {
            Some(TelegramResponse { ok: true, .. }) => Ok(()),
            Some(TelegramResponse { description, .. }) => Err(DigestError::Delivery(format!(
                "Telegram API error: {}",
                description.unwrap_or_else(|| "Unknown Telegram API error".to_string())
            ))),
            None => Err(DigestError::Delivery(
                "Telegram API error: Unknown Telegram API error".into(),
            )),
        }
    }
}
