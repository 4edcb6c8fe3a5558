//! Machine-readable failure output for the CI workflow that runs digests.
//!
//! Failed topics are written as GitHub Actions `::error` workflow commands,
//! followed by a collapsible group repeating every failure.

use crate::models::{DispatchOutcome, RunReport};

/// One `::error` line for a failed topic. Newlines in the detail are escaped so
/// the record stays on a single line.
pub fn failure_annotation(outcome: &DispatchOutcome) -> String {
    let detail = outcome.error_detail.as_deref().unwrap_or("unknown error");
    format!(
        "::error title=Failed for topic::{} error={}",
        escape_data(&outcome.topic),
        escape_data(detail)
    )
}

/// Annotation lines for every failed topic, in topic order
pub fn failure_annotations(report: &RunReport) -> Vec<String> {
    report
        .failures()
        .into_iter()
        .map(failure_annotation)
        .collect()
}

/// Per-failure lines followed by the grouped summary; `None` when the run succeeded
pub fn render_failure_output(report: &RunReport) -> Option<String> {
    let lines = failure_annotations(report);
    if lines.is_empty() {
        return None;
    }

    let mut out = String::new();
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("::group::Summary of failures\n");
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("::endgroup::\n");

    Some(out)
}

/// Workflow-command message escaping
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DigestError;
    use crate::models::TopicStage;

    fn failed(topic: &str, error: DigestError) -> DispatchOutcome {
        DispatchOutcome::failure(topic, TopicStage::Fetching, &error)
    }

    #[test]
    fn test_failure_annotation() {
        let outcome = failed(
            "Agentic AI",
            DigestError::Fetch("Perplexity API request timed out".into()),
        );
        assert_eq!(
            failure_annotation(&outcome),
            "::error title=Failed for topic::Agentic AI error=fetch failed: Perplexity API request timed out"
        );
    }

    #[test]
    fn test_annotation_stays_single_line() {
        let outcome = failed("Rust", DigestError::Fetch("500:\n{\"error\": \"100%\"}".into()));
        let line = failure_annotation(&outcome);
        assert!(!line.contains('\n'));
        assert!(line.ends_with("500:%0A{\"error\": \"100%25\"}"));
    }

    #[test]
    fn test_render_success_is_none() {
        let mut report = RunReport::new();
        report.record(DispatchOutcome::success("Rust"));
        assert!(render_failure_output(&report).is_none());
    }

    #[test]
    fn test_render_failure_output() {
        let mut report = RunReport::new();
        report.record(failed("A", DigestError::Fetch("boom".into())));
        report.record(DispatchOutcome::success("B"));
        report.record(failed("C", DigestError::Delivery("Telegram API error: Forbidden".into())));

        let out = render_failure_output(&report).unwrap();
        assert_eq!(
            out,
            "::error title=Failed for topic::A error=fetch failed: boom\n\
             ::error title=Failed for topic::C error=delivery failed: Telegram API error: Forbidden\n\
             ::group::Summary of failures\n\
             ::error title=Failed for topic::A error=fetch failed: boom\n\
             ::error title=Failed for topic::C error=delivery failed: Telegram API error: Forbidden\n\
             ::endgroup::\n"
        );
    }
}
