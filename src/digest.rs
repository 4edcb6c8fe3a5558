use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

use crate::models::{DigestMode, FormattedDigest, UpdateResult};

/// Inline citation markers such as `[1]` or `[23]`
static CITATION_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").unwrap());

/// Turns a raw topic update into delivery-ready text. Pure; no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestFormatter {
    mode: DigestMode,
}

impl DigestFormatter {
    pub fn new(mode: DigestMode) -> Self {
        Self { mode }
    }

    pub fn format(&self, topic: &str, update: &UpdateResult) -> FormattedDigest {
        let statements = clean_lines(&update.response_text);
        let sources = render_sources(&update.citations);

        let mut text = format!("**📰 {} Update on {}**\n\n", self.mode.title(), topic);
        text.push_str(&statements.join("\n\n"));
        text.push_str("\n\n📚 **Sources:**\n");
        text.push_str(&sources.join("\n"));

        FormattedDigest::new(text)
    }
}

/// Trim, drop blank lines, strip citation markers and end every line with a period
pub fn clean_lines(response: &str) -> Vec<String> {
    response
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(clean_line)
        .collect()
}

fn clean_line(line: &str) -> String {
    let mut line = CITATION_MARKER.replace_all(line, "").into_owned();
    if !line.ends_with('.') {
        line.push('.');
    }
    line
}

/// `1. example.com`, one entry per citation in order
pub fn render_sources(citations: &[String]) -> Vec<String> {
    citations
        .iter()
        .enumerate()
        .map(|(i, url)| format!("{}. {}", i + 1, display_domain(url)))
        .collect()
}

/// Host of a citation URL without a leading `www.`; unparseable URLs are shown as given.
pub fn display_domain(url: &str) -> String {
    let url = url.trim();
    match Url::parse(url).ok().as_ref().and_then(Url::host_str) {
        Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
        None => url.to_string(),
    }
}
