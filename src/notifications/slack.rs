use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::NotificationChannel;
use crate::config::SlackConfig;
use crate::error::DigestError;

/// Slack incoming-webhook sender
pub struct SlackChannel {
    client: Client,
    webhook_url: String,
    channel: Option<String>,
}

#[derive(Serialize)]
struct SlackMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    text: &'a str,
    blocks: Vec<SlackBlock<'a>>,
}

#[derive(Serialize)]
struct SlackBlock<'a> {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: SlackText<'a>,
}

#[derive(Serialize)]
struct SlackText<'a> {
    #[serde(rename = "type")]
    text_type: &'static str,
    text: &'a str,
}

impl SlackChannel {
    pub fn new(config: &SlackConfig) -> Result<Self, DigestError> {
        let webhook_url = config
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                DigestError::Configuration("SLACK_WEBHOOK_URL is not configured".into())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DigestError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            webhook_url: webhook_url.to_string(),
            channel: config.channel.clone(),
        })
    }

    fn message<'a>(&'a self, text: &'a str) -> SlackMessage<'a> {
        SlackMessage {
            channel: self.channel.as_deref(),
            text,
            blocks: vec![SlackBlock {
                block_type: "section",
                text: SlackText {
                    text_type: "mrkdwn",
                    text,
                },
            }],
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, text: &str) -> Result<(), DigestError> {
        debug!("Sending Slack notification");

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.message(text))
            .send()
            .await
            .map_err(|e| {
                DigestError::Delivery(format!(
                    "Failed to send Slack notification: {}",
                    e.without_url()
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Slack notification failed");
            return Err(DigestError::Delivery(format!(
                "Slack webhook returned error: {} - {}",
                status, body
            )));
        }

        info!("Slack notification sent");
        Ok(())
    }
}
