use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::NotificationChannel;
use crate::config::WhatsAppConfig;
use crate::error::DigestError;

/// WhatsApp sender backed by the Twilio Messages API
pub struct WhatsAppChannel {
    client: Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    code: Option<u64>,
    message: Option<String>,
}

impl WhatsAppChannel {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, DigestError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| DigestError::Configuration(format!("{} is not configured", name)))
        };

        let account_sid = required(&config.account_sid, "TWILIO_ACCOUNT_SID")?;
        let auth_token = required(&config.auth_token, "TWILIO_AUTH_TOKEN")?;
        let from = required(&config.from_number, "TWILIO_WHATSAPP_NUMBER")?;
        let to = required(&config.to_number, "MY_WHATSAPP_NUMBER")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DigestError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            messages_url: format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                config.api_base.trim_end_matches('/'),
                account_sid
            ),
            account_sid,
            auth_token,
            from: whatsapp_address(&from),
            to: whatsapp_address(&to),
        })
    }
}

/// Twilio addresses WhatsApp numbers as `whatsapp:+15551234567`
fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{}", number)
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, text: &str) -> Result<(), DigestError> {
        debug!("Sending WhatsApp message");

        let form = [
            ("From", self.from.as_str()),
            ("To", self.to.as_str()),
            ("Body", text),
        ];

        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DigestError::Delivery("Twilio API request timed out".into())
                } else {
                    DigestError::Delivery(format!("Twilio API request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let detail = match serde_json::from_str::<TwilioError>(&body) {
                Ok(TwilioError {
                    code: Some(code),
                    message: Some(message),
                }) => format!("{} (code {})", message, code),
                Ok(TwilioError {
                    message: Some(message),
                    ..
                }) => message,
                _ => body,
            };
            return Err(DigestError::Delivery(format!(
                "Twilio API error ({}): {}",
                status, detail
            )));
        }

        let sid = serde_json::from_str::<TwilioMessage>(&body)
            .ok()
            .and_then(|m| m.sid)
            .unwrap_or_default();
        info!(sid = %sid, "WhatsApp message sent");

        Ok(())
    }
}
