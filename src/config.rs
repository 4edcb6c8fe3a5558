use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::DigestMode;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub topics: Vec<String>,
    pub digest: DigestConfig,
    pub perplexity: PerplexityConfig,
    pub channels: ChannelsConfig,
}

/// Digest shape and sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub mode: DigestMode,
    /// Response length cap; falls back to the mode's default when unset
    pub max_tokens: Option<u32>,
    pub temperature: f32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            mode: DigestMode::Daily,
            max_tokens: None,
            temperature: 0.3,
        }
    }
}

impl DigestConfig {
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or_else(|| self.mode.default_max_tokens())
    }
}

/// Perplexity completion API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerplexityConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for PerplexityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "sonar".to_string(),
            endpoint: "https://api.perplexity.ai/chat/completions".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Notification channels configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChannelsConfig {
    pub telegram: TelegramConfig,
    pub slack: SlackConfig,
    pub whatsapp: WhatsAppConfig,
}

impl ChannelsConfig {
    /// Names of the channels that will receive digests
    pub fn enabled_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.telegram.enabled {
            names.push("telegram");
        }
        if self.slack.enabled {
            names.push("slack");
        }
        if self.whatsapp.enabled {
            names.push("whatsapp");
        }
        names
    }
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
    pub parse_mode: String,
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            parse_mode: "Markdown".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Slack incoming-webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub webhook_url: Option<String>,
    pub channel: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            channel: None,
            timeout_secs: 10,
        }
    }
}

/// WhatsApp delivery through the Twilio Messages API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub account_sid: Option<String>,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            account_sid: None,
            auth_token: None,
            from_number: None,
            to_number: None,
            api_base: "https://api.twilio.com".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), topics = config.topics.len(), "Loaded configuration");

        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    ///
    /// Supplying a channel's credentials through the environment enables
    /// that channel.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get("TOPICS") {
            self.topics = parse_topics(&raw).context("Failed to parse TOPICS")?;
        }
        if let Some(mode) = get("DIGEST_MODE") {
            self.digest.mode = mode.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(key) = get("PERPLEXITY_API_KEY") {
            self.perplexity.api_key = Some(key);
        }

        let telegram = &mut self.channels.telegram;
        let token = get("TELEGRAM_BOT_TOKEN");
        let chat_id = get("TELEGRAM_CHAT_ID");
        if token.is_some() && chat_id.is_some() {
            telegram.enabled = true;
        }
        if let Some(token) = token {
            telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = chat_id {
            telegram.chat_id = Some(chat_id);
        }

        if let Some(url) = get("SLACK_WEBHOOK_URL") {
            self.channels.slack.webhook_url = Some(url);
            self.channels.slack.enabled = true;
        }

        let whatsapp = &mut self.channels.whatsapp;
        let mut twilio_from_env = 0;
        for (key, slot) in [
            ("TWILIO_ACCOUNT_SID", &mut whatsapp.account_sid),
            ("TWILIO_AUTH_TOKEN", &mut whatsapp.auth_token),
            ("TWILIO_WHATSAPP_NUMBER", &mut whatsapp.from_number),
            ("MY_WHATSAPP_NUMBER", &mut whatsapp.to_number),
        ] {
            if let Some(value) = get(key) {
                *slot = Some(value);
                twilio_from_env += 1;
            }
        }
        if twilio_from_env == 4 {
            whatsapp.enabled = true;
        }

        debug!(
            topics = self.topics.len(),
            mode = %self.digest.mode,
            channels = ?self.channels.enabled_names(),
            "Applied environment overrides"
        );

        Ok(())
    }

    /// Topics to process, optionally narrowed by a glob pattern
    pub fn select_topics(&self, only: Option<&str>) -> Result<Vec<String>> {
        let Some(pattern) = only else {
            return Ok(self.topics.clone());
        };

        let pattern = glob::Pattern::new(pattern)
            .with_context(|| format!("Invalid topic pattern: {}", pattern))?;

        Ok(self
            .topics
            .iter()
            .filter(|t| pattern.matches(t))
            .cloned()
            .collect())
    }
}

/// Parse a topic list given either as a JSON array or as comma-separated text
pub fn parse_topics(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();

    let topics: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).context("TOPICS is not a valid JSON array of strings")?
    } else {
        raw.split(',').map(str::to_string).collect()
    };

    Ok(topics
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}
