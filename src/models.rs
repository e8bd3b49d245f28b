//! Data models shared by every stage of the feed pipeline.
//!
//! - [`RawItem`]: an item as an adapter extracted it, before normalization
//! - [`Item`]: a normalized item with an absolute link and a definite date
//! - [`SourceOutcome`]: the explicit result of running one source
//! - [`SourceDiagnostic`]: why a source contributed nothing to the run

use chrono::{DateTime, Utc};

/// An item exactly as a source adapter produced it.
///
/// The link may still be relative and the date may be missing; both are
/// settled by the normalizer, never by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    /// Headline text, never empty.
    pub title: String,
    /// Link as found in the document, possibly relative.
    pub link: String,
    /// Summary text, possibly empty.
    pub description: String,
    /// Publication time if the source exposed a parseable one.
    pub published_at: Option<DateTime<Utc>>,
}

impl RawItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: String::new(),
            published_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }
}

/// A normalized feed item.
///
/// `link` is absolute and is the identity of the item within a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Title suffixed with the source label, e.g. `"Headline (TRM Labs)"`.
    pub title: String,
    /// Absolute URL; the dedup key.
    pub link: String,
    pub description: String,
    /// Publication time, defaulted to the run's fetch time when unknown.
    pub published_at: DateTime<Utc>,
    /// Label of the source the item came from.
    pub source_label: String,
}

/// Raw items from one source, tagged with that source's dispatch position.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    /// Position of the source in the configured list.
    pub index: usize,
    pub label: String,
    /// Base URL used to absolutize this source's relative links.
    pub base_url: url::Url,
    pub items: Vec<RawItem>,
}

/// The result of running a single source.
#[derive(Debug)]
pub enum SourceOutcome {
    Success(Vec<RawItem>),
    Failure(String),
}

/// A per-source failure recorded during aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDiagnostic {
    pub label: String,
    pub reason: String,
}

impl std::fmt::Display for SourceDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source {} failed: {}", self.label, self.reason)
    }
}
