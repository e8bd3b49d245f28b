//! Normalization, deduplication and ranking of aggregated items.
//!
//! Raw items arrive grouped by source, in source order. Building a
//! [`Collection`] from them:
//!
//! 1. absolutizes every link against its source's base URL
//! 2. appends the source label to the title, e.g. `"Headline (TRM Labs)"`
//! 3. fills in a missing publication time with the run's fetch time
//! 4. keeps only the first item seen for each link
//! 5. sorts newest first (stable, so ties keep arrival order)
//! 6. truncates to the configured maximum

use crate::models::{Item, RawItem, SourceBatch};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use tracing::{debug, info, instrument};
use url::Url;

/// A merged, deduplicated, newest-first list of items.
///
/// Invariants: no two items share a link, every item has a date, and the
/// length never exceeds the maximum it was built with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    items: Vec<Item>,
}

impl Collection {
    /// Normalize, dedup, rank and truncate the aggregated batches.
    #[instrument(level = "info", skip(batches))]
    pub fn build(
        batches: Vec<SourceBatch>,
        fetched_at: DateTime<Utc>,
        max_items: usize,
    ) -> Self {
        // First-arrival dedup is only deterministic in configured order
        debug_assert!(
            batches.windows(2).all(|w| w[0].index < w[1].index),
            "batches must arrive in configured order"
        );
        let normalized = normalize(batches, fetched_at);
        let before = normalized.len();
        let unique = dedup(normalized);
        let items = rank(unique, max_items);

        let per_source = items.iter().counts_by(|i| i.source_label.clone());
        debug!(?per_source, "Items kept per source");
        info!(normalized = before, kept = items.len(), "Built collection");
        Self { items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Resolve `link` against `base`. Already-absolute links come back unchanged
/// (up to URL normalization). Only web links are accepted.
pub fn absolutize(base: &Url, link: &str) -> Option<String> {
    let url = base.join(link.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Map raw items onto normalized items, in arrival order.
pub fn normalize(batches: Vec<SourceBatch>, fetched_at: DateTime<Utc>) -> Vec<Item> {
    batches
        .into_iter()
        .flat_map(|batch| {
            let SourceBatch {
                label,
                base_url,
                items,
                ..
            } = batch;
            items
                .into_iter()
                .filter_map(move |raw| normalize_item(raw, &label, &base_url, fetched_at))
        })
        .collect()
}

fn normalize_item(
    raw: RawItem,
    label: &str,
    base_url: &Url,
    fetched_at: DateTime<Utc>,
) -> Option<Item> {
    let Some(link) = absolutize(base_url, &raw.link) else {
        debug!(link = %raw.link, source = label, "Dropping item with unusable link");
        return None;
    };
    let title = raw.title.trim();
    if title.is_empty() {
        debug!(%link, source = label, "Dropping item without title");
        return None;
    }

    Some(Item {
        title: format!("{title} ({label})"),
        link,
        description: raw.description,
        published_at: raw.published_at.unwrap_or(fetched_at),
        source_label: label.to_string(),
    })
}

/// Keep the first occurrence of every link, across all sources.
pub fn dedup(items: Vec<Item>) -> Vec<Item> {
    items
        .into_iter()
        .unique_by(|item| item.link.clone())
        .collect()
}

/// Newest first, ties in arrival order, at most `max_items` long.
pub fn rank(mut items: Vec<Item>, max_items: usize) -> Vec<Item> {
    // sort_by is stable
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(max_items);
    items
}
