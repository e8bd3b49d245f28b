//! Document fetching.
//!
//! The pipeline only ever sees "the text of the document". [`Fetcher`] is the
//! seam between the network and the adapters, which keeps the extraction and
//! aggregation logic testable with in-memory documents.

use crate::error::SourceUnavailable;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = concat!("awful_feedgen/", env!("CARGO_PKG_VERSION"));

/// Retrieves the text of a document.
pub trait Fetcher {
    /// Fetch `url`, failing with [`SourceUnavailable::Timeout`] if it takes
    /// longer than `limit`.
    async fn fetch(&self, url: &str, limit: Duration) -> Result<String, SourceUnavailable>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str, limit: Duration) -> Result<String, SourceUnavailable> {
        let t0 = Instant::now();
        let request = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(SourceUnavailable::Status(status.as_u16()));
            }
            Ok::<_, SourceUnavailable>(response.text().await?)
        };

        match timeout(limit, request).await {
            Ok(Ok(body)) => {
                debug!(
                    bytes = body.len(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Fetched document"
                );
                Ok(body)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Fetch failed");
                Err(e)
            }
            Err(_) => {
                warn!(?limit, "Fetch timed out");
                Err(SourceUnavailable::Timeout(limit))
            }
        }
    }
}
