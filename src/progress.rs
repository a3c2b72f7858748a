//! Crawl progress reporting.
//!
//! Reports observable progress during `wkg crawl` so users can see how far
//! the listing has got and when the output is being committed. Progress is
//! emitted on **stderr** so stdout (the summary) stays parseable for scripts.

use std::io::Write;

/// How often [`CrawlProgressEvent::Enumerating`] is emitted, in pages.
pub const REPORT_EVERY: u64 = 500;

/// A single progress event for a crawl.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CrawlProgressEvent {
    /// Listing has started against this source.
    Started { source: String },
    /// `pages` titles yielded so far over `batches` listing calls.
    Enumerating {
        source: String,
        pages: u64,
        batches: u64,
    },
    /// Listing finished; the output is being flushed and committed.
    Committing { source: String, triples: u64 },
    /// Triples are being uploaded to the store.
    Loading { dataset: String, triples: u64 },
}

/// Reports crawl progress. Implementations write to stderr (human or JSON).
pub trait CrawlProgressReporter: Send + Sync {
    fn report(&self, event: CrawlProgressEvent);
}

/// Human-friendly progress on stderr: "crawl tolkiengateway.net  enumerating  1,500 pages (3 batches)".
pub struct StderrProgress;

impl CrawlProgressReporter for StderrProgress {
    fn report(&self, event: CrawlProgressEvent) {
        let line = match &event {
            CrawlProgressEvent::Started { source } => {
                format!("crawl {}  listing pages...\n", source)
            }
            CrawlProgressEvent::Enumerating {
                source,
                pages,
                batches,
            } => format!(
                "crawl {}  enumerating  {} pages ({} batches)\n",
                source,
                format_number(*pages),
                format_number(*batches)
            ),
            CrawlProgressEvent::Committing { source, triples } => format!(
                "crawl {}  writing  {} triples\n",
                source,
                format_number(*triples)
            ),
            CrawlProgressEvent::Loading { dataset, triples } => format!(
                "load {}  uploading  {} triples\n",
                dataset,
                format_number(*triples)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl CrawlProgressReporter for JsonProgress {
    fn report(&self, event: CrawlProgressEvent) {
        let obj = match &event {
            CrawlProgressEvent::Started { source } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "started"
            }),
            CrawlProgressEvent::Enumerating {
                source,
                pages,
                batches,
            } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "enumerating",
                "pages": pages,
                "batches": batches
            }),
            CrawlProgressEvent::Committing { source, triples } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "committing",
                "triples": triples
            }),
            CrawlProgressEvent::Loading { dataset, triples } => serde_json::json!({
                "event": "progress",
                "dataset": dataset,
                "phase": "loading",
                "triples": triples
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl CrawlProgressReporter for NoProgress {
    fn report(&self, _event: CrawlProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn CrawlProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn parse_progress_mode() {
        assert_eq!(ProgressMode::parse("json"), Some(ProgressMode::Json));
        assert_eq!(ProgressMode::parse("human"), Some(ProgressMode::Human));
        assert_eq!(ProgressMode::parse("off"), Some(ProgressMode::Off));
        assert_eq!(ProgressMode::parse("verbose"), None);
    }
}
