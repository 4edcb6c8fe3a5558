use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::UpdateSource;
use crate::config::{DigestConfig, PerplexityConfig};
use crate::error::DigestError;
use crate::models::{DigestMode, UpdateResult};

/// Client for the Perplexity chat completions API
pub struct PerplexityClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    mode: DigestMode,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    return_citations: bool,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// System instruction and user query sent for one topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Token counts and cost reported alongside a completion. Any field the API
/// leaves out stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageRecord {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub total_cost: Option<f64>,
}

impl UsageRecord {
    pub fn from_payload(payload: &Value) -> Self {
        let usage = payload.get("usage");
        let field = |name: &str| usage.and_then(|u| u.get(name)).and_then(Value::as_u64);

        Self {
            prompt_tokens: field("prompt_tokens"),
            completion_tokens: field("completion_tokens"),
            total_tokens: field("total_tokens"),
            total_cost: usage
                .and_then(|u| u.get("cost"))
                .and_then(|c| c.get("total_cost"))
                .and_then(Value::as_f64),
        }
    }
}

impl PerplexityClient {
    /// Fails fast when no API key is configured, before any request is made.
    pub fn new(config: &PerplexityConfig, digest: &DigestConfig) -> Result<Self, DigestError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| DigestError::Configuration("Perplexity API key is required".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DigestError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            mode: digest.mode,
            max_tokens: digest.max_tokens(),
            temperature: digest.temperature,
        })
    }

    pub fn mode(&self) -> DigestMode {
        self.mode
    }

    async fn request(&self, prompt: PromptPair) -> Result<Value, DigestError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: prompt.system,
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            return_citations: true,
        };

        debug!("Sending request to Perplexity API");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DigestError::Fetch("Perplexity API request timed out".into())
                } else {
                    DigestError::Fetch(format!("Failed to send request to Perplexity: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DigestError::Fetch(format!(
                "Perplexity API error ({}): {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DigestError::Fetch(format!("Failed to read Perplexity response: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| DigestError::Parse(format!("response body is not valid JSON: {}", e)))
    }
}

#[async_trait]
impl UpdateSource for PerplexityClient {
    #[instrument(skip(self), fields(mode = %self.mode))]
    async fn fetch(&self, topic: &str) -> Result<UpdateResult, DigestError> {
        info!("Requesting topic update");

        let prompt = build_prompt(topic, self.mode, Local::now().date_naive());
        let payload = self.request(prompt).await?;

        let update = parse_response(&payload)?;
        report_usage(topic, &UsageRecord::from_payload(&payload));

        info!(
            citations = update.citations.len(),
            chars = update.response_text.len(),
            "Topic update received"
        );

        Ok(update)
    }
}

/// Emit usage as a structured event; this is the billing hook.
fn report_usage(topic: &str, usage: &UsageRecord) {
    info!(
        target: "topic_digest::billing",
        topic,
        prompt_tokens = ?usage.prompt_tokens,
        completion_tokens = ?usage.completion_tokens,
        total_tokens = ?usage.total_tokens,
        total_cost = ?usage.total_cost,
        "Completion usage"
    );
}

/// Split a completion payload into the digest body and its citation URLs
pub(crate) fn parse_response(payload: &Value) -> Result<UpdateResult, DigestError> {
    let response_text = payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| DigestError::Parse("missing choices[0].message.content".into()))?
        .to_string();

    let citations = match payload.get("citations") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item.as_str() {
                Some(url) => Some(url.to_string()),
                None => {
                    warn!(citation = %item, "Skipping non-string citation");
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!(citations = %other, "Ignoring malformed citations field");
            Vec::new()
        }
        None => Vec::new(),
    };

    Ok(UpdateResult {
        response_text,
        citations,
    })
}

pub(crate) fn format_long_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

/// Build the system instruction and user query for a topic on a given day
pub(crate) fn build_prompt(topic: &str, mode: DigestMode, today: NaiveDate) -> PromptPair {
    PromptPair {
        system: build_system_prompt(mode, today),
        user: build_user_prompt(topic, mode, today),
    }
}

fn build_system_prompt(mode: DigestMode, today: NaiveDate) -> String {
    let current_date = format_long_date(today);
    let (min_items, max_items) = mode.item_bounds();

    let (window, quiet_window) = match mode {
        DigestMode::Daily => ("from today".to_string(), "today"),
        DigestMode::Weekly => {
            let start = today - chrono::Duration::days(mode.lookback_days());
            (
                format!(
                    "from the past {} days ({} to {})",
                    mode.lookback_days(),
                    format_long_date(start),
                    current_date
                ),
                "in this period",
            )
        }
    };

    format!(
        r#"You are a strict tech change-log generator.
Today's date is {current_date}.

Task:
- Output ONLY {min_items}–{max_items} bullet points
- Each point must describe a REAL, CONCRETE, DATED update {window}
- Focus ONLY on:
• New version releases
• Security patches and advisories
• Major feature drops
• Acquisitions, funding, shutdowns
• Breaking infrastructure changes

HARD RULES:
- NO opinions
- NO praise
- NO explanations
- NO history
- NO marketing language
- NO "praised", "popular", "widely used", "continues to", etc.
- NO repeated events
- ONE update per bullet
- ONE line per bullet

Required Output Format (STRICT):
• <Product/Framework> <version or event> — <what changed>

Example:
• FastAPI 0.111 released — adds HTTP/3 support
• Python 3.14 beta 2 released — improves JIT compilation

If there are NO real updates {quiet_window}, output ONLY:
"No real updates for {current_date}""#
    )
}

fn build_user_prompt(topic: &str, mode: DigestMode, today: NaiveDate) -> String {
    let question = match mode {
        DigestMode::Daily => format!(
            "What are today's most important developments and news in {}?",
            topic
        ),
        DigestMode::Weekly => {
            let start = today - chrono::Duration::days(mode.lookback_days());
            format!(
                "What were the most important developments and news in {} between {} and {}?",
                topic,
                format_long_date(start),
                format_long_date(today)
            )
        }
    };

    format!(
        "{}\nFocus on framework updates, new releases, acquisitions, product launches,\n\
         and market-impacting announcements. Include sources.",
        question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let config = PerplexityConfig::default();
        let result = PerplexityClient::new(&config, &DigestConfig::default());
        assert!(matches!(result, Err(DigestError::Configuration(_))));

        let config = PerplexityConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        let result = PerplexityClient::new(&config, &DigestConfig::default());
        assert!(matches!(result, Err(DigestError::Configuration(_))));
    }

    #[test]
    fn test_client_takes_mode_from_digest_config() {
        let config = PerplexityConfig {
            api_key: Some("pplx-test".to_string()),
            ..Default::default()
        };
        let digest = DigestConfig {
            mode: DigestMode::Weekly,
            ..Default::default()
        };
        let client = PerplexityClient::new(&config, &digest).unwrap();
        assert_eq!(client.mode(), DigestMode::Weekly);
        assert_eq!(client.max_tokens, 400);
    }

    #[test]
    fn test_long_date_format() {
        assert_eq!(format_long_date(date(2025, 2, 3)), "February 03, 2025");
    }

    #[test]
    fn test_daily_prompt() {
        let prompt = build_prompt("FastAPI", DigestMode::Daily, date(2025, 6, 1));

        assert!(prompt.system.contains("Today's date is June 01, 2025."));
        assert!(prompt.system.contains("Output ONLY 3–6 bullet points"));
        assert!(prompt.system.ends_with("\"No real updates for June 01, 2025\""));
        assert!(prompt
            .user
            .starts_with("What are today's most important developments and news in FastAPI?"));
        assert!(prompt.user.ends_with("Include sources."));
    }

    #[test]
    fn test_weekly_prompt() {
        let prompt = build_prompt("Agentic AI", DigestMode::Weekly, date(2025, 6, 8));

        assert!(prompt.system.contains("Output ONLY 5–8 bullet points"));
        assert!(prompt
            .system
            .contains("from the past 7 days (June 01, 2025 to June 08, 2025)"));
        assert!(prompt.system.contains("No real updates for June 08, 2025"));
        assert!(prompt.user.contains(
            "in Agentic AI between June 01, 2025 and June 08, 2025?"
        ));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_prompt("Python", DigestMode::Daily, date(2025, 1, 1));
        let b = build_prompt("Python", DigestMode::Daily, date(2025, 1, 1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_response() {
        let payload = json!({
            "choices": [{"message": {"role": "assistant", "content": "• Rust 1.80 released [1]"}}],
            "citations": ["https://blog.rust-lang.org/", "https://github.com/rust-lang/rust"]
        });

        let update = parse_response(&payload).unwrap();
        assert_eq!(update.response_text, "• Rust 1.80 released [1]");
        assert_eq!(
            update.citations,
            vec!["https://blog.rust-lang.org/", "https://github.com/rust-lang/rust"]
        );
    }

    #[test]
    fn test_parse_response_without_citations() {
        let payload = json!({"choices": [{"message": {"content": "No real updates"}}]});
        let update = parse_response(&payload).unwrap();
        assert!(update.citations.is_empty());
    }

    #[test]
    fn test_parse_response_skips_bad_citations() {
        let payload = json!({
            "choices": [{"message": {"content": "x"}}],
            "citations": ["https://a.example", 7, null, "https://b.example"]
        });
        let update = parse_response(&payload).unwrap();
        assert_eq!(update.citations, vec!["https://a.example", "https://b.example"]);

        let payload = json!({"choices": [{"message": {"content": "x"}}], "citations": "oops"});
        assert!(parse_response(&payload).unwrap().citations.is_empty());
    }

    #[test]
    fn test_parse_response_missing_content() {
        for payload in [
            json!({}),
            json!({"choices": []}),
            json!({"choices": [{"message": {}}]}),
            json!({"choices": [{"message": {"content": null}}]}),
        ] {
            let err = parse_response(&payload).unwrap_err();
            assert!(matches!(err, DigestError::Parse(_)));
        }
    }

    #[test]
    fn test_usage_record() {
        let payload = json!({
            "usage": {
                "prompt_tokens": 120,
                "completion_tokens": 80,
                "total_tokens": 200,
                "cost": {"total_cost": 0.0061}
            }
        });

        let usage = UsageRecord::from_payload(&payload);
        assert_eq!(usage.prompt_tokens, Some(120));
        assert_eq!(usage.completion_tokens, Some(80));
        assert_eq!(usage.total_tokens, Some(200));
        assert_eq!(usage.total_cost, Some(0.0061));
    }

    #[test]
    fn test_usage_record_missing_fields() {
        assert_eq!(UsageRecord::from_payload(&json!({})), UsageRecord::default());

        let usage = UsageRecord::from_payload(&json!({"usage": {"total_tokens": 9}}));
        assert_eq!(usage.total_tokens, Some(9));
        assert_eq!(usage.prompt_tokens, None);
        assert_eq!(usage.total_cost, None);
    }
}
