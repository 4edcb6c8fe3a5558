use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use topic_digest::{
    render_failure_output, Config, DigestFormatter, DigestMode, NotificationService,
    Orchestrator, PerplexityClient, StdoutChannel,
};

#[derive(Parser)]
#[command(name = "topic-digest")]
#[command(about = "Fetch topic update digests and deliver them to chat channels")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, env = "TOPIC_DIGEST_CONFIG", default_value = "topic-digest.yml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, format and deliver a digest for every configured topic
    Run {
        /// Digest mode (daily or weekly), overrides the configured mode
        #[arg(long)]
        mode: Option<DigestMode>,

        /// Topic to process instead of the configured list (repeatable)
        #[arg(long = "topic")]
        topics: Vec<String>,

        /// Only process topics matching this glob pattern
        #[arg(long)]
        only: Option<String>,

        /// Print digests to stdout instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration and credentials without contacting any service
    Check,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env is fine; the environment may already be populated
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries digests and workflow annotations
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("topic_digest=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    config.apply_env()?;

    match cli.command {
        Commands::Run {
            mode,
            topics,
            only,
            dry_run,
        } => run_digests(config, mode, topics, only, dry_run).await,
        Commands::Check => {
            check_config(&config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_digests(
    mut config: Config,
    mode: Option<DigestMode>,
    topics: Vec<String>,
    only: Option<String>,
    dry_run: bool,
) -> Result<ExitCode> {
    if let Some(mode) = mode {
        config.digest.mode = mode;
    }
    if !topics.is_empty() {
        config.topics = topics;
    }

    let topics = config.select_topics(only.as_deref())?;
    if topics.is_empty() {
        anyhow::bail!("No topics to process. Set TOPICS or list topics in the config file");
    }

    // Credentials are checked here, before the first topic is fetched
    let fetcher = PerplexityClient::new(&config.perplexity, &config.digest)?;
    let formatter = DigestFormatter::new(config.digest.mode);

    let report = if dry_run {
        info!(topics = topics.len(), "Dry run, digests will be printed");
        Orchestrator::new(fetcher, formatter, StdoutChannel)
            .run(&topics)
            .await
    } else {
        let channels = NotificationService::from_config(&config.channels)?;
        info!(channels = ?channels.channel_names(), "Notification channels ready");
        Orchestrator::new(fetcher, formatter, channels)
            .run(&topics)
            .await
    };

    match render_failure_output(&report) {
        Some(output) => {
            print!("{}", output);
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

fn check_config(config: &Config) -> Result<()> {
    PerplexityClient::new(&config.perplexity, &config.digest)?;
    let channels = NotificationService::from_config(&config.channels)?;

    println!("Configuration OK\n");
    println!("  Mode:     {}", config.digest.mode);
    println!("  Model:    {}", config.perplexity.model);
    println!("  Channels: {}", channels.channel_names().join(", "));
    println!("  Topics:   {}", config.topics.len());
    for topic in &config.topics {
        println!("    - {}", topic);
    }

    Ok(())
}
