use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while producing or delivering a topic digest
#[derive(Error, Debug)]
pub enum DigestError {
    /// A required credential or setting is missing. Raised when a component
    /// is constructed, never in the middle of a run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The completion API could not be reached, timed out, or returned a non-2xx status
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The completion API answered 2xx with a body missing the expected fields
    #[error("unexpected completion response: {0}")]
    Parse(String),

    /// A notification channel rejected the message or could not be reached
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl DigestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DigestError::Configuration(_) => ErrorKind::Configuration,
            DigestError::Fetch(_) => ErrorKind::Fetch,
            DigestError::Parse(_) => ErrorKind::Parse,
            DigestError::Delivery(_) => ErrorKind::Delivery,
        }
    }

    /// Cause text without the category prefix
    pub fn message(&self) -> &str {
        match self {
            DigestError::Configuration(m)
            | DigestError::Fetch(m)
            | DigestError::Parse(m)
            | DigestError::Delivery(m) => m,
        }
    }
}

/// Error category, kept on outcomes so logs can tell parse and fetch failures apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Configuration,
    Fetch,
    Parse,
    Delivery,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Fetch => "fetch",
            ErrorKind::Parse => "parse",
            ErrorKind::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
