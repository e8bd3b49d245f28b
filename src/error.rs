//! Error types for the feed generator.
//!
//! Two layers exist:
//!
//! - [`SourceUnavailable`]: anything that stops a single source from producing
//!   items. The aggregator catches these and turns them into diagnostics, so
//!   they never end a run.
//! - [`Error`]: run-level failures (bad configuration, unwritable output).
//!   These are fatal.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A source could not be fetched or its document could not be loaded.
#[derive(Debug, Error)]
pub enum SourceUnavailable {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("document could not be parsed: {0}")]
    Parse(String),

    #[error("run deadline reached before the source finished")]
    Deadline,
}

/// Fatal, run-level errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("failed to render feed: {0}")]
    Render(#[from] std::io::Error),

    #[error("failed to write output {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
