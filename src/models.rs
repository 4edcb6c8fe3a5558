use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DigestError, ErrorKind};

/// How far back a digest looks and how many items it asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestMode {
    #[default]
    Daily,
    Weekly,
}

impl DigestMode {
    /// Inclusive bounds on the number of bullet items requested
    pub fn item_bounds(&self) -> (u32, u32) {
        match self {
            DigestMode::Daily => (3, 6),
            DigestMode::Weekly => (5, 8),
        }
    }

    pub fn lookback_days(&self) -> i64 {
        match self {
            DigestMode::Daily => 1,
            DigestMode::Weekly => 7,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DigestMode::Daily => "Daily",
            DigestMode::Weekly => "Weekly",
        }
    }

    pub fn default_max_tokens(&self) -> u32 {
        match self {
            DigestMode::Daily => 150,
            DigestMode::Weekly => 400,
        }
    }
}

impl FromStr for DigestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(DigestMode::Daily),
            "weekly" => Ok(DigestMode::Weekly),
            other => Err(format!(
                "unknown digest mode '{}', expected 'daily' or 'weekly'",
                other
            )),
        }
    }
}

impl fmt::Display for DigestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DigestMode::Daily => "daily",
            DigestMode::Weekly => "weekly",
        })
    }
}

/// Structured answer for one topic: digest body plus its ordered source URLs.
///
/// Inline markers such as `[2]` in `response_text` refer to `citations[1]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub response_text: String,
    pub citations: Vec<String>,
}

/// Delivery-ready digest text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedDigest(String);

impl FormattedDigest {
    pub fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormattedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a topic is in the fetch -> format -> dispatch sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStage {
    Pending,
    Fetching,
    Formatting,
    Dispatching,
    Succeeded,
    Failed,
}

impl TopicStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TopicStage::Succeeded | TopicStage::Failed)
    }
}

impl fmt::Display for TopicStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TopicStage::Pending => "pending",
            TopicStage::Fetching => "fetching",
            TopicStage::Formatting => "formatting",
            TopicStage::Dispatching => "dispatching",
            TopicStage::Succeeded => "succeeded",
            TopicStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of processing a single topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub topic: String,
    pub succeeded: bool,
    pub error_detail: Option<String>,
    /// Stage that was running when the topic failed
    pub failed_stage: Option<TopicStage>,
    pub error_kind: Option<ErrorKind>,
}

impl DispatchOutcome {
    pub fn success(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            succeeded: true,
            error_detail: None,
            failed_stage: None,
            error_kind: None,
        }
    }

    pub fn failure(topic: impl Into<String>, stage: TopicStage, error: &DigestError) -> Self {
        Self {
            topic: topic.into(),
            succeeded: false,
            error_detail: Some(error.to_string()),
            failed_stage: Some(stage),
            error_kind: Some(error.kind()),
        }
    }
}

/// Outcomes of one full pass over the configured topics, in topic order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<DispatchOutcome>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: DispatchOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True iff no topic failed. An empty run counts as a success.
    pub fn overall_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.succeeded)
    }

    /// Every failed outcome, in topic order
    pub fn failures(&self) -> Vec<&DispatchOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded).collect()
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
