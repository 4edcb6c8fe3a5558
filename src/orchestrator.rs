use tracing::{debug, error, info, info_span, Instrument};

use crate::adapters::UpdateSource;
use crate::digest::DigestFormatter;
use crate::error::DigestError;
use crate::models::{DispatchOutcome, RunReport, TopicStage};
use crate::notifications::NotificationChannel;

/// Runs fetch -> format -> dispatch for each topic, one topic at a time
pub struct Orchestrator<S: UpdateSource, C: NotificationChannel> {
    source: S,
    formatter: DigestFormatter,
    channel: C,
}

impl<S: UpdateSource, C: NotificationChannel> Orchestrator<S, C> {
    pub fn new(source: S, formatter: DigestFormatter, channel: C) -> Self {
        Self {
            source,
            formatter,
            channel,
        }
    }

    /// Process every topic in order. A failing topic is recorded and the run
    /// moves on; nothing short-circuits.
    pub async fn run(&self, topics: &[String]) -> RunReport {
        let mut report = RunReport::new();

        info!(run_id = %report.run_id, topics = topics.len(), "Starting digest run");

        for topic in topics {
            debug!(topic = %topic, stage = %TopicStage::Pending, "Queued topic");
            let span = info_span!("topic", topic = %topic);
            let outcome = match self.process(topic).instrument(span).await {
                Ok(()) => {
                    info!(topic = %topic, stage = %TopicStage::Succeeded, "Digest dispatched");
                    DispatchOutcome::success(topic.as_str())
                }
                Err((stage, e)) => {
                    error!(
                        topic = %topic,
                        stage = %stage,
                        kind = %e.kind(),
                        error = %e,
                        "Topic failed"
                    );
                    DispatchOutcome::failure(topic.as_str(), stage, &e)
                }
            };
            report.record(outcome);
        }

        report.finish();

        info!(
            run_id = %report.run_id,
            succeeded = report.succeeded_count(),
            failed = report.failures().len(),
            "Digest run complete"
        );

        report
    }

    /// One topic's sequence. The error carries the stage that was running.
    async fn process(&self, topic: &str) -> Result<(), (TopicStage, DigestError)> {
        debug!(stage = %TopicStage::Fetching, "Fetching update");
        let update = self
            .source
            .fetch(topic)
            .await
            .map_err(|e| (TopicStage::Fetching, e))?;

        debug!(
            stage = %TopicStage::Formatting,
            citations = update.citations.len(),
            "Formatting digest"
        );
        let digest = self.formatter.format(topic, &update);

        debug!(
            stage = %TopicStage::Dispatching,
            channel = self.channel.name(),
            "Dispatching digest"
        );
        self.channel
            .send(digest.as_str())
            .await
            .map_err(|e| (TopicStage::Dispatching, e))
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}
