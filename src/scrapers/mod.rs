//! Source adapters that turn a fetched document into raw items.
//!
//! Every configured source is handled by exactly one adapter kind:
//!
//! | Kind | Module | Input | Notes |
//! |------|--------|-------|-------|
//! | `feed` | [`feed`] | RSS 2.0, RSS 1.0 or Atom | Entries map one-to-one onto items |
//! | `html` | [`html`] | Free-form listing page | Cascading candidate strategies |
//!
//! Both share the same two-phase shape:
//!
//! 1. **Fetch**: download the document through a [`Fetcher`]
//! 2. **Extract**: parse the text into [`RawItem`]s
//!
//! Adapters never normalize. Relative links, missing dates and title tagging
//! are left to the normalizer.

pub mod feed;
pub mod html;

use crate::config::{Config, SourceConfig, SourceKind};
use crate::error::SourceUnavailable;
use crate::fetch::Fetcher;
use crate::models::RawItem;
use feed::FeedAdapter;
use html::HtmlAdapter;
use std::time::Duration;
use tracing::{info, instrument};

/// Closed set of adapter kinds.
#[derive(Debug)]
pub enum SourceAdapter {
    Structured(FeedAdapter),
    Html(HtmlAdapter),
}

impl SourceAdapter {
    /// Build the adapter a source's kind calls for.
    pub fn for_source(config: &Config, source: &SourceConfig) -> Result<Self, String> {
        let max_items = config.source_max_items(source);
        match source.kind {
            SourceKind::Feed => Ok(Self::Structured(FeedAdapter::new(&source.url, max_items))),
            SourceKind::Html => HtmlAdapter::from_source(source, max_items).map(Self::Html),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            SourceAdapter::Structured(a) => a.url(),
            SourceAdapter::Html(a) => a.url(),
        }
    }

    /// Download the source document.
    pub async fn fetch<F: Fetcher>(
        &self,
        fetcher: &F,
        limit: Duration,
    ) -> Result<String, SourceUnavailable> {
        fetcher.fetch(self.url(), limit).await
    }

    /// Turn a document into raw items.
    ///
    /// Only a structured document that cannot be parsed at all is an error;
    /// HTML structure drift degrades to fewer (possibly zero) items.
    pub fn extract(&self, document: &str) -> Result<Vec<RawItem>, SourceUnavailable> {
        match self {
            SourceAdapter::Structured(a) => a.extract(document),
            SourceAdapter::Html(a) => Ok(a.extract(document)),
        }
    }

    /// Fetch then extract.
    #[instrument(level = "info", skip_all, fields(url = %self.url()))]
    pub async fn run<F: Fetcher>(
        &self,
        fetcher: &F,
        limit: Duration,
    ) -> Result<Vec<RawItem>, SourceUnavailable> {
        let document = self.fetch(fetcher, limit).await?;
        let items = self.extract(&document)?;
        info!(count = items.len(), "Extracted items");
        Ok(items)
    }
}
