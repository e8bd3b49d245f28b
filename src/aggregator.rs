//! Fan-out over all configured sources with per-source fault isolation.
//!
//! Sources are fetched concurrently (bounded by `concurrency`), but each one
//! is tagged with its position in the config before dispatch. Results are
//! put back in that order afterwards, so completion timing never changes the
//! output.
//!
//! A source that fails in any way (network error, bad status, timeout,
//! unparseable feed) contributes a [`SourceDiagnostic`] instead of items and
//! the run carries on with the others.

use crate::config::{Config, SourceConfig};
use crate::error::SourceUnavailable;
use crate::fetch::Fetcher;
use crate::models::{SourceBatch, SourceDiagnostic, SourceOutcome};
use crate::scrapers::SourceAdapter;
use futures::stream::{self, StreamExt};
use tokio::time::{Instant, timeout_at};
use tracing::{info, instrument, warn};

/// Everything the sources produced in one run.
#[derive(Debug, Default)]
pub struct Aggregation {
    /// Successful sources, in configured order.
    pub batches: Vec<SourceBatch>,
    /// One entry per source that produced nothing.
    pub diagnostics: Vec<SourceDiagnostic>,
}

/// Run every configured source and collect the outcomes.
///
/// Never fails: the worst case is an empty set of batches and one
/// diagnostic per source.
#[instrument(level = "info", skip_all, fields(sources = config.sources.len()))]
pub async fn aggregate<F: Fetcher>(config: &Config, fetcher: &F) -> Aggregation {
    let deadline = config.run_deadline().map(|d| Instant::now() + d);
    let mut outcomes: Vec<Option<SourceOutcome>> =
        config.sources.iter().map(|_| None).collect();

    let mut pending = stream::iter(config.sources.iter().enumerate())
        .map(|(index, source)| async move { (index, run_source(config, fetcher, source).await) })
        .buffer_unordered(config.concurrency.max(1));

    loop {
        let next = match deadline {
            Some(at) => match timeout_at(at, pending.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!("Run deadline reached; abandoning sources still in flight");
                    break;
                }
            },
            None => pending.next().await,
        };
        let Some((index, outcome)) = next else {
            break;
        };
        outcomes[index] = Some(outcome);
    }
    drop(pending);

    let mut aggregation = Aggregation::default();
    for (index, (source, outcome)) in config.sources.iter().zip(outcomes).enumerate() {
        let outcome = outcome
            .unwrap_or_else(|| SourceOutcome::Failure(SourceUnavailable::Deadline.to_string()));
        match (outcome, source.base_url()) {
            (SourceOutcome::Success(items), Ok(base_url)) => {
                info!(source = %source.label, count = items.len(), "Source succeeded");
                aggregation.batches.push(SourceBatch {
                    index,
                    label: source.label.clone(),
                    base_url,
                    items,
                });
            }
            (SourceOutcome::Success(_), Err(e)) => {
                aggregation.diagnostics.push(diagnostic(source, format!("invalid base url: {e}")));
            }
            (SourceOutcome::Failure(reason), _) => {
                aggregation.diagnostics.push(diagnostic(source, reason));
            }
        }
    }

    info!(
        succeeded = aggregation.batches.len(),
        failed = aggregation.diagnostics.len(),
        items = aggregation.batches.iter().map(|b| b.items.len()).sum::<usize>(),
        "Aggregation complete"
    );
    aggregation
}

/// Run one source, turning every failure into an explicit outcome.
async fn run_source<F: Fetcher>(
    config: &Config,
    fetcher: &F,
    source: &SourceConfig,
) -> SourceOutcome {
    let adapter = match SourceAdapter::for_source(config, source) {
        Ok(adapter) => adapter,
        Err(reason) => {
            warn!(source = %source.label, %reason, "Source misconfigured");
            return SourceOutcome::Failure(reason);
        }
    };

    match adapter.run(fetcher, config.source_timeout(source)).await {
        Ok(items) => SourceOutcome::Success(items),
        Err(e) => {
            warn!(source = %source.label, error = %e, "Source failed; excluding it from this run");
            SourceOutcome::Failure(e.to_string())
        }
    }
}

fn diagnostic(source: &SourceConfig, reason: String) -> SourceDiagnostic {
    SourceDiagnostic {
        label: source.label.clone(),
        reason,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::time::sleep;

    pub const FEED_A: &str = r#"<rss version="2.0"><channel>
<item><title>A one</title><link>https://a.test/1</link><pubDate>Tue, 04 Mar 2025 10:00:00 GMT</pubDate></item>
<item><title>A two</title><link>https://a.test/2</link><pubDate>Mon, 03 Mar 2025 10:00:00 GMT</pubDate></item>
</channel></rss>"#;

    pub const PAGE_B: &str = r#"<html><body>
<article><h2><a href="/blog/b1">B first</a></h2><time datetime="2025-03-05">Mar 5</time></article>
<article><h2><a href="/blog/b2">B second</a></h2></article>
</body></html>"#;

    /// In-memory stand-in for the network.
    #[derive(Default)]
    pub struct MockFetcher {
        pages: HashMap<String, (Result<String, u16>, Duration)>,
    }

    impl MockFetcher {
        pub fn page(mut self, url: &str, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), (Ok(body.to_string()), Duration::ZERO));
            self
        }

        pub fn slow_page(mut self, url: &str, body: &str, delay: Duration) -> Self {
            self.pages.insert(url.to_string(), (Ok(body.to_string()), delay));
            self
        }

        pub fn failing(mut self, url: &str, status: u16) -> Self {
            self.pages.insert(url.to_string(), (Err(status), Duration::ZERO));
            self
        }
    }

    impl Fetcher for MockFetcher {
        async fn fetch(&self, url: &str, limit: Duration) -> Result<String, SourceUnavailable> {
            let Some((page, delay)) = self.pages.get(url) else {
                return Err(SourceUnavailable::Status(404));
            };
            if *delay > limit {
                sleep(limit).await;
                return Err(SourceUnavailable::Timeout(limit));
            }
            sleep(*delay).await;
            page.clone().map_err(SourceUnavailable::Status)
        }
    }

    pub fn three_source_config() -> Config {
        Config::from_yaml(
            r#"
sources:
  - label: A
    url: https://a.test/feed.xml
    kind: feed
  - label: B
    url: https://b.test/news
    base_url: https://b.test
    kind: html
  - label: C
    url: https://c.test/feed.xml
    kind: feed
    timeout_secs: 1
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_one_failing_source_is_isolated() {
        let config = three_source_config();
        let fetcher = MockFetcher::default()
            .page("https://a.test/feed.xml", FEED_A)
            .page("https://b.test/news", PAGE_B)
            .failing("https://c.test/feed.xml", 503);

        let aggregation = aggregate(&config, &fetcher).await;

        assert_eq!(aggregation.batches.len(), 2);
        assert_eq!(aggregation.batches[0].label, "A");
        assert_eq!(aggregation.batches[0].items.len(), 2);
        assert_eq!(aggregation.batches[1].label, "B");
        assert_eq!(aggregation.batches[1].items.len(), 2);
        assert_eq!(
            aggregation.diagnostics,
            vec![SourceDiagnostic {
                label: "C".to_string(),
                reason: "unexpected HTTP status 503".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_parse_failure_and_timeout_are_diagnostics() {
        let config = three_source_config();
        let fetcher = MockFetcher::default()
            .page("https://a.test/feed.xml", "<html>not a feed</html>")
            .page("https://b.test/news", PAGE_B)
            .slow_page("https://c.test/feed.xml", FEED_A, Duration::from_secs(5));

        let aggregation = aggregate(&config, &fetcher).await;

        assert_eq!(aggregation.batches.len(), 1);
        assert_eq!(aggregation.batches[0].label, "B");
        let labels: Vec<_> = aggregation.diagnostics.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "C"]);
        assert!(aggregation.diagnostics[0].reason.contains("could not be parsed"));
        assert!(aggregation.diagnostics[1].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn test_order_follows_config_not_completion() {
        let config = three_source_config();
        let fetcher = MockFetcher::default()
            .slow_page("https://a.test/feed.xml", FEED_A, Duration::from_millis(150))
            .page("https://b.test/news", PAGE_B)
            .page("https://c.test/feed.xml", FEED_A);

        let aggregation = aggregate(&config, &fetcher).await;

        let order: Vec<_> = aggregation
            .batches
            .iter()
            .map(|b| (b.index, b.label.as_str()))
            .collect();
        assert_eq!(order, vec![(0, "A"), (1, "B"), (2, "C")]);
        assert!(aggregation.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_run_deadline_keeps_finished_sources() {
        let mut config = three_source_config();
        config.run_deadline_secs = Some(1);
        config.sources[2].timeout_secs = Some(30);
        let fetcher = MockFetcher::default()
            .page("https://a.test/feed.xml", FEED_A)
            .page("https://b.test/news", PAGE_B)
            .slow_page("https://c.test/feed.xml", FEED_A, Duration::from_secs(10));

        let aggregation = aggregate(&config, &fetcher).await;

        assert_eq!(aggregation.batches.len(), 2);
        assert_eq!(aggregation.diagnostics.len(), 1);
        assert_eq!(aggregation.diagnostics[0].label, "C");
        assert_eq!(
            aggregation.diagnostics[0].reason,
            SourceUnavailable::Deadline.to_string()
        );
    }

    #[tokio::test]
    async fn test_all_sources_fail() {
        let config = three_source_config();
        let aggregation = aggregate(&config, &MockFetcher::default()).await;
        assert!(aggregation.batches.is_empty());
        assert_eq!(aggregation.diagnostics.len(), 3);
    }

    #[tokio::test]
    async fn test_sequential_when_concurrency_is_one() {
        let mut config = three_source_config();
        config.concurrency = 1;
        let fetcher = MockFetcher::default()
            .page("https://a.test/feed.xml", FEED_A)
            .page("https://b.test/news", PAGE_B)
            .page("https://c.test/feed.xml", FEED_A);

        let aggregation = aggregate(&config, &fetcher).await;
        assert_eq!(aggregation.batches.len(), 3);
    }
}
