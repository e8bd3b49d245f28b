//! Command-line interface definitions for Awful Feedgen.
//!
//! Every option here overrides the matching value from the config file.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the feed generator.
///
/// # Examples
///
/// ```sh
/// # Built-in sources, write ./feed.xml
/// awful_feedgen
///
/// # Custom sources, capped at 50 items, written to the web root
/// awful_feedgen -c sources.yaml -n 50 -o /var/www/feed.xml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file describing the sources
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to write the generated feed
    #[arg(short, long, env = "FEEDGEN_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Maximum number of items in the merged feed
    #[arg(short = 'n', long)]
    pub max_items: Option<usize>,

    /// Number of sources fetched concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Give up on sources still in flight after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}
