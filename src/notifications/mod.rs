pub mod slack;
pub mod telegram;
pub mod whatsapp;

pub use slack::SlackChannel;
pub use telegram::TelegramChannel;
pub use whatsapp::WhatsAppChannel;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ChannelsConfig;
use crate::error::DigestError;

/// A destination that accepts one digest message per call.
///
/// Implementations make exactly one delivery attempt and report every kind of
/// failure (transport, non-2xx status, or a 2xx body that says the send did
/// not happen) as [`DigestError::Delivery`].
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, text: &str) -> Result<(), DigestError>;
}

/// Fans a digest out to every configured channel
pub struct NotificationService {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationService {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Result<Self, DigestError> {
        if channels.is_empty() {
            return Err(DigestError::Configuration(
                "at least one notification channel must be enabled".into(),
            ));
        }
        Ok(Self { channels })
    }

    /// Build every enabled channel. Missing credentials on an enabled channel
    /// fail here, before any topic is processed.
    pub fn from_config(config: &ChannelsConfig) -> Result<Self, DigestError> {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if config.telegram.enabled {
            channels.push(Box::new(TelegramChannel::new(&config.telegram)?));
        }
        if config.slack.enabled {
            channels.push(Box::new(SlackChannel::new(&config.slack)?));
        }
        if config.whatsapp.enabled {
            channels.push(Box::new(WhatsAppChannel::new(&config.whatsapp)?));
        }

        Self::new(channels)
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }
}

#[async_trait]
impl NotificationChannel for NotificationService {
    fn name(&self) -> &str {
        "notification-service"
    }

    /// Attempts every channel once, even after an earlier one fails
    async fn send(&self, text: &str) -> Result<(), DigestError> {
        let mut failures = Vec::new();

        for channel in &self.channels {
            match channel.send(text).await {
                Ok(()) => info!(channel = channel.name(), "Digest delivered"),
                Err(e) => {
                    warn!(channel = channel.name(), error = %e, "Digest delivery failed");
                    failures.push(format!("{}: {}", channel.name(), e.message()));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DigestError::Delivery(failures.join("; ")))
        }
    }
}

/// Prints digests instead of sending them
#[derive(Debug, Default)]
pub struct StdoutChannel;

#[async_trait]
impl NotificationChannel for StdoutChannel {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, text: &str) -> Result<(), DigestError> {
        println!("{}\n", text);
        Ok(())
    }
}
