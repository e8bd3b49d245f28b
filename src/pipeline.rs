//! One complete run: aggregate every source, then build the collection.

use crate::aggregator::aggregate;
use crate::collection::Collection;
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::models::SourceDiagnostic;
use chrono::{DateTime, Utc};
use tracing::instrument;

/// Result of a run, ready to be serialized and reported.
#[derive(Debug)]
pub struct RunReport {
    pub collection: Collection,
    pub diagnostics: Vec<SourceDiagnostic>,
}

/// Fetch, extract, normalize, dedup and rank.
///
/// `fetched_at` is the run's fetch time; it becomes the date of every item
/// whose source did not provide one.
#[instrument(level = "info", skip_all, fields(%fetched_at))]
pub async fn generate<F: Fetcher>(
    config: &Config,
    fetcher: &F,
    fetched_at: DateTime<Utc>,
) -> RunReport {
    let aggregation = aggregate(config, fetcher).await;
    let collection = Collection::build(aggregation.batches, fetched_at, config.max_items);
    RunReport {
        collection,
        diagnostics: aggregation.diagnostics,
    }
}
