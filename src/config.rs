//! Run configuration loaded from an optional YAML file.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes. With no file at all the built-in configuration tracks the
//! TRM Labs blog, which publishes no feed of its own.
//!
//! ```yaml
//! max_items: 30
//! output: feed.xml
//! channel:
//!   title: Security Reading (auto RSS)
//!   link: https://example.com
//!   description: Merged feed
//! defaults:
//!   max_items: 30
//!   timeout_secs: 20
//! sources:
//!   - label: Example Blog
//!     url: https://example.com/blog
//!     kind: html
//!     selectors: ["article", ".post"]
//!     content_paths: ["/blog/"]
//!   - label: Example Feed
//!     url: https://example.org/feed.xml
//!     kind: feed
//! ```

use crate::cli::Cli;
use crate::error::{Error, Result};
use scraper::Selector;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// How a source's document is turned into items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// An RSS or Atom document.
    Feed,
    /// A free-form HTML listing page.
    Html,
}

/// One configured origin of items.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Human-readable name appended to every item title.
    pub label: String,
    /// Document to fetch.
    pub url: String,
    /// Base for resolving relative links; defaults to `url`.
    #[serde(default)]
    pub base_url: Option<String>,
    pub kind: SourceKind,
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Ordered candidate selectors for HTML sources. Empty means the
    /// built-in cascade.
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub title_selector: Option<String>,
    #[serde(default)]
    pub description_selector: Option<String>,
    #[serde(default)]
    pub date_selector: Option<String>,
    /// Path fragments that mark a link as content, e.g. `/blog/`.
    #[serde(default)]
    pub content_paths: Vec<String>,
    /// Only keep links whose path starts with this prefix.
    #[serde(default)]
    pub link_prefix: Option<String>,
}

impl SourceConfig {
    /// The URL relative links of this source are resolved against.
    pub fn base_url(&self) -> std::result::Result<Url, url::ParseError> {
        Url::parse(self.base_url.as_deref().unwrap_or(&self.url))
    }
}

/// Fixed channel-level metadata for the generated document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            title: "TRM Labs Blog (auto RSS)".to_string(),
            link: "https://www.trmlabs.com/resources/blog".to_string(),
            description:
                "Automated RSS feed for TRM Labs blog (sanctions / AML / crypto compliance)."
                    .to_string(),
        }
    }
}

/// Per-source limits applied when a source does not set its own.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceDefaults {
    pub max_items: usize,
    pub timeout_secs: u64,
}

impl Default for SourceDefaults {
    fn default() -> Self {
        Self {
            max_items: 30,
            timeout_secs: 20,
        }
    }
}

/// The full run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of items in the merged feed.
    pub max_items: usize,
    /// How many sources are fetched at once.
    pub concurrency: usize,
    /// Optional deadline for the whole fetch phase.
    pub run_deadline_secs: Option<u64>,
    pub output: PathBuf,
    pub channel: Channel,
    pub defaults: SourceDefaults,
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_items: 30,
            concurrency: 4,
            run_deadline_secs: None,
            output: PathBuf::from("feed.xml"),
            channel: Channel::default(),
            defaults: SourceDefaults::default(),
            sources: vec![SourceConfig {
                label: "TRM Labs".to_string(),
                url: "https://www.trmlabs.com/resources/blog".to_string(),
                base_url: Some("https://www.trmlabs.com".to_string()),
                kind: SourceKind::Html,
                max_items: None,
                timeout_secs: None,
                selectors: vec!["a.resource-card[href]".to_string()],
                title_selector: Some("h2, h3, .card-title".to_string()),
                description_selector: Some("p, .card-description, .text-sm".to_string()),
                date_selector: None,
                content_paths: vec!["/resources/blog/".to_string()],
                link_prefix: Some("https://www.trmlabs.com/resources/blog/".to_string()),
            }],
        }
    }
}

impl Config {
    /// Load the config file if one is given, otherwise the built-in default.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file given; using built-in configuration");
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(sources = config.sources.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Command-line values take precedence over the file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(output) = &cli.output {
            self.output = output.clone();
        }
        if let Some(max_items) = cli.max_items {
            self.max_items = max_items;
        }
        if let Some(concurrency) = cli.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(deadline) = cli.deadline_secs {
            self.run_deadline_secs = Some(deadline);
        }
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::Config("no sources configured".to_string()));
        }
        if self.max_items == 0 {
            return Err(Error::Config("max_items must be greater than zero".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be greater than zero".to_string()));
        }

        for source in &self.sources {
            if source.label.trim().is_empty() {
                return Err(Error::Config(format!("source {} has an empty label", source.url)));
            }
            Url::parse(&source.url)
                .map_err(|e| Error::Config(format!("source {}: bad url: {e}", source.label)))?;
            source
                .base_url()
                .map_err(|e| Error::Config(format!("source {}: bad base_url: {e}", source.label)))?;

            let selectors = source
                .selectors
                .iter()
                .chain(source.title_selector.iter())
                .chain(source.description_selector.iter())
                .chain(source.date_selector.iter());
            for selector in selectors {
                Selector::parse(selector).map_err(|e| {
                    Error::Config(format!(
                        "source {}: invalid selector {selector:?}: {e}",
                        source.label
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Effective item cap for a source.
    pub fn source_max_items(&self, source: &SourceConfig) -> usize {
        source.max_items.unwrap_or(self.defaults.max_items)
    }

    /// Effective fetch timeout for a source.
    pub fn source_timeout(&self, source: &SourceConfig) -> Duration {
        Duration::from_secs(source.timeout_secs.unwrap_or(self.defaults.timeout_secs))
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const SAMPLE: &str = r#"
max_items: 10
output: out/feed.xml
channel:
  title: Merged
  link: https://example.com
  description: All the things
defaults:
  timeout_secs: 5
sources:
  - label: Blog
    url: https://example.com/blog
    kind: html
    selectors: ["article", ".post"]
    content_paths: ["/blog/"]
    max_items: 3
  - label: Feed
    url: https://example.org/feed.xml
    kind: feed
    timeout_secs: 9
"#;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_items, 30);
        assert_eq!(config.sources[0].kind, SourceKind::Html);
    }

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_items, 10);
        assert_eq!(config.output, PathBuf::from("out/feed.xml"));
        assert_eq!(config.channel.title, "Merged");
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].kind, SourceKind::Feed);
        // Unset fields fall back to defaults
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.defaults.max_items, 30);
    }

    #[test]
    fn test_per_source_limits() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let blog = &config.sources[0];
        let feed = &config.sources[1];

        assert_eq!(config.source_max_items(blog), 3);
        assert_eq!(config.source_max_items(feed), 30);
        assert_eq!(config.source_timeout(blog), Duration::from_secs(5));
        assert_eq!(config.source_timeout(feed), Duration::from_secs(9));
    }

    #[test]
    fn test_base_url_defaults_to_url() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(
            config.sources[0].base_url().unwrap().as_str(),
            "https://example.com/blog"
        );
        let default = Config::default();
        assert_eq!(
            default.sources[0].base_url().unwrap().as_str(),
            "https://www.trmlabs.com/"
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let raw = "sources:\n  - label: X\n    url: https://x.test\n    kind: carrier-pigeon\n";
        assert!(Config::from_yaml(raw).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_sources() {
        let config = Config {
            sources: vec![],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_selector() {
        let mut config = Config::default();
        config.sources[0].selectors = vec!["a[[".to_string()];
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.sources[0].url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_apply_cli_overrides() {
        let mut config = Config::default();
        let cli = Cli::parse_from([
            "awful_feedgen",
            "--output",
            "/tmp/x.xml",
            "--max-items",
            "5",
            "--deadline-secs",
            "60",
        ]);
        config.apply_cli(&cli);

        assert_eq!(config.output, PathBuf::from("/tmp/x.xml"));
        assert_eq!(config.max_items, 5);
        assert_eq!(config.run_deadline(), Some(Duration::from_secs(60)));
        assert_eq!(config.concurrency, 4);
    }
}
