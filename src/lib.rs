pub mod adapters;
pub mod config;
pub mod digest;
pub mod error;
pub mod models;
pub mod notifications;
pub mod orchestrator;
pub mod report;

pub use adapters::{PerplexityClient, UpdateSource, UsageRecord};
pub use config::Config;
pub use digest::DigestFormatter;
pub use error::{DigestError, ErrorKind};
pub use models::*;
pub use notifications::{
    NotificationChannel, NotificationService, SlackChannel, StdoutChannel, TelegramChannel,
    WhatsAppChannel,
};
pub use orchestrator::Orchestrator;
pub use report::render_failure_output;
