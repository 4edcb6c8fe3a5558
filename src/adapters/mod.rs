pub mod perplexity;

pub use perplexity::{PerplexityClient, UsageRecord};

use async_trait::async_trait;

use crate::error::DigestError;
use crate::models::UpdateResult;

/// Source of structured topic updates
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetch the latest update for a topic. Makes exactly one attempt.
    async fn fetch(&self, topic: &str) -> Result<UpdateResult, DigestError>;
}
