//! Heuristic adapter for HTML listing pages that publish no feed.
//!
//! Listing pages have no schema, so items are located with an ordered list of
//! candidate strategies:
//!
//! 1. `article` elements
//! 2. elements carrying a post-style class (`.post`, `.entry`, ...)
//! 3. elements carrying a card-style class (`.card`, `.resource-card`, ...)
//! 4. links whose path contains a content fragment such as `/blog/`
//!
//! A source may replace steps 1-3 with its own selectors. The first strategy
//! that matches anything is used on its own; strategies are never mixed,
//! since different strategies tend to pick incompatible structures on the
//! same page.
//!
//! When the chosen strategy still yields no usable item, a last-resort pass
//! keeps every content-looking link on the page. Structure drift therefore
//! degrades the output instead of failing the source.

use crate::config::SourceConfig;
use crate::dates::parse_date;
use crate::models::RawItem;
use crate::utils::element_text;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

/// Titles shorter than this are navigation noise ("»", "Go", ...).
pub const MIN_TITLE_CHARS: usize = 3;

const DEFAULT_CANDIDATES: &[&str] = &[
    "article",
    ".post, .blog-post, .post-item, .entry, .news-item",
    ".card, .post-card, .blog-card, .article-card, .resource-card",
];
const DEFAULT_TITLE: &str = "h1, h2, h3, h4, h5, h6, .title, .card-title";
const DEFAULT_DESCRIPTION: &str = "p, .excerpt, .summary, .description, .card-description";
const DEFAULT_DATE: &str = "time, .date, .published, .post-date, [itemprop='datePublished']";
const DEFAULT_CONTENT_PATHS: &[&str] = &[
    "/blog/", "/news/", "/post/", "/posts/", "/article/", "/articles/", "/resources/",
];

static LINK: Lazy<Selector> = Lazy::new(|| sel("a[href]"));

fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("built-in selector is valid")
}

/// One way of locating item-like elements in a document.
#[derive(Debug)]
pub enum Strategy {
    /// Elements matching a CSS selector.
    Select(Selector),
    /// Links whose path contains one of the source's content fragments.
    ContentLinks,
}

/// Heuristic extraction engine for one HTML source.
#[derive(Debug)]
pub struct HtmlAdapter {
    url: String,
    base_url: Url,
    strategies: Vec<Strategy>,
    title: Selector,
    description: Selector,
    date: Selector,
    content_paths: Vec<String>,
    link_prefix: Option<String>,
    max_items: usize,
}

impl HtmlAdapter {
    /// Compile the source's hints, falling back to the built-in heuristics
    /// for anything it leaves out.
    pub fn from_source(source: &SourceConfig, max_items: usize) -> Result<Self, String> {
        let parse = |s: &str| {
            Selector::parse(s).map_err(|e| format!("invalid selector {s:?}: {e}"))
        };

        let mut strategies = Vec::new();
        if source.selectors.is_empty() {
            strategies.extend(DEFAULT_CANDIDATES.iter().map(|s| Strategy::Select(sel(s))));
            strategies.push(Strategy::ContentLinks);
        } else {
            for s in &source.selectors {
                strategies.push(Strategy::Select(parse(s.as_str())?));
            }
        }

        let content_paths = if source.content_paths.is_empty() {
            DEFAULT_CONTENT_PATHS.iter().map(|s| s.to_string()).collect()
        } else {
            source.content_paths.clone()
        };

        Ok(Self {
            url: source.url.clone(),
            base_url: source.base_url().map_err(|e| format!("invalid base url: {e}"))?,
            strategies,
            title: parse(source.title_selector.as_deref().unwrap_or(DEFAULT_TITLE))?,
            description: parse(
                source
                    .description_selector
                    .as_deref()
                    .unwrap_or(DEFAULT_DESCRIPTION),
            )?,
            date: parse(source.date_selector.as_deref().unwrap_or(DEFAULT_DATE))?,
            content_paths,
            link_prefix: source.link_prefix.clone(),
            max_items,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Extract items from a listing page. Never fails; a page that matches
    /// nothing yields an empty list.
    pub fn extract(&self, html: &str) -> Vec<RawItem> {
        let document = Html::parse_document(html);

        let chosen = self.strategies.iter().enumerate().find_map(|(i, strategy)| {
            let candidates = self.candidates(strategy, &document);
            (!candidates.is_empty()).then_some((i, candidates))
        });

        let mut items = match chosen {
            Some((index, candidates)) => {
                debug!(
                    url = %self.url,
                    strategy = index,
                    candidates = candidates.len(),
                    "Selected candidate strategy"
                );
                self.items_from_candidates(&candidates)
            }
            None => Vec::new(),
        };

        if items.is_empty() {
            items = self.last_resort(&document);
            info!(
                url = %self.url,
                count = items.len(),
                "No strategy produced items; used link fallback"
            );
        }
        items
    }

    fn candidates<'a>(&self, strategy: &Strategy, document: &'a Html) -> Vec<ElementRef<'a>> {
        match strategy {
            Strategy::Select(selector) => outermost(document.select(selector).collect()),
            Strategy::ContentLinks => document
                .select(&LINK)
                .filter(|a| {
                    a.value()
                        .attr("href")
                        .and_then(|href| self.resolve(href))
                        .is_some_and(|url| self.is_content_path(&url))
                })
                .collect(),
        }
    }

    fn items_from_candidates(&self, candidates: &[ElementRef<'_>]) -> Vec<RawItem> {
        let mut items = Vec::new();
        for candidate in candidates {
            if items.len() >= self.max_items {
                break;
            }
            if let Some(item) = self.item_from_candidate(candidate) {
                items.push(item);
            }
        }
        items
    }

    fn item_from_candidate(&self, candidate: &ElementRef<'_>) -> Option<RawItem> {
        let is_link = candidate.value().name() == "a" && candidate.value().attr("href").is_some();
        let anchor = if is_link {
            *candidate
        } else {
            candidate.select(&LINK).next()?
        };
        let link = self.resolve(anchor.value().attr("href")?)?;
        if !self.passes_prefix(&link) {
            debug!(%link, "Skipping link outside prefix");
            return None;
        }

        let title = candidate
            .select(&self.title)
            .map(|h| element_text(&h))
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| element_text(&anchor));
        if title.chars().count() < MIN_TITLE_CHARS {
            debug!(%link, %title, "Discarding candidate with unusable title");
            return None;
        }

        let description = candidate
            .select(&self.description)
            .next()
            .map(|p| element_text(&p))
            .unwrap_or_default();

        let published_at = candidate.select(&self.date).next().and_then(|d| {
            d.value()
                .attr("datetime")
                .and_then(parse_date)
                .or_else(|| parse_date(&element_text(&d)))
        });

        Some(
            RawItem::new(title, link.to_string())
                .with_description(description)
                .with_published_at(published_at),
        )
    }

    /// Every content-looking link on the page, titled by its own text.
    fn last_resort(&self, document: &Html) -> Vec<RawItem> {
        let mut items = Vec::new();
        for anchor in document.select(&LINK) {
            if items.len() >= self.max_items {
                break;
            }
            let Some(link) = anchor.value().attr("href").and_then(|h| self.resolve(h)) else {
                continue;
            };
            if !self.is_content_path(&link) || !self.passes_prefix(&link) {
                continue;
            }
            let title = element_text(&anchor);
            if title.chars().count() < MIN_TITLE_CHARS {
                continue;
            }
            items.push(RawItem::new(title, link.to_string()));
        }
        items
    }

    /// Resolve an `href` against the base URL, keeping only web links.
    fn resolve(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        let url = self.base_url.join(href).ok()?;
        matches!(url.scheme(), "http" | "https").then_some(url)
    }

    fn is_content_path(&self, url: &Url) -> bool {
        let path = url.path();
        // The section index itself ("/blog/") is not content
        self.content_paths.iter().any(|fragment| {
            path.contains(fragment.as_str())
                && path.trim_end_matches('/') != fragment.trim_end_matches('/')
        })
    }

    fn passes_prefix(&self, url: &Url) -> bool {
        match &self.link_prefix {
            None => true,
            Some(prefix) if prefix.starts_with("http://") || prefix.starts_with("https://") => {
                url.as_str().starts_with(prefix.as_str())
            }
            Some(prefix) => url.path().starts_with(prefix.as_str()),
        }
    }
}

/// Drop elements nested inside another matched element, so a `.post` that
/// wraps a `.post-item` counts once.
fn outermost(elements: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
    let ids: HashSet<_> = elements.iter().map(|e| e.id()).collect();
    elements
        .into_iter()
        .filter(|e| !e.ancestors().any(|a| ids.contains(&a.id())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceConfig, SourceKind};
    use chrono::{TimeZone, Utc};

    fn source_config(selectors: &[&str]) -> SourceConfig {
        SourceConfig {
            label: "Test".to_string(),
            url: "https://example.com/blog".to_string(),
            base_url: Some("https://example.com".to_string()),
            kind: SourceKind::Html,
            max_items: None,
            timeout_secs: None,
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            title_selector: None,
            description_selector: None,
            date_selector: None,
            content_paths: vec![],
            link_prefix: None,
        }
    }

    fn adapter(selectors: &[&str]) -> HtmlAdapter {
        HtmlAdapter::from_source(&source_config(selectors), 30).unwrap()
    }

    #[test]
    fn test_article_strategy() {
        let html = r#"
            <html><body>
              <article>
                <h2><a href="/blog/first">First headline</a></h2>
                <p>First summary.</p>
                <time datetime="2025-03-04T10:00:00Z">March 4</time>
              </article>
              <article>
                <a href="https://other.example/blog/second">Second headline</a>
                <span class="date">January 9, 2025</span>
              </article>
            </body></html>"#;
        let items = adapter(&[]).extract(html);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "First headline");
        assert_eq!(items[0].link, "https://example.com/blog/first");
        assert_eq!(items[0].description, "First summary.");
        assert_eq!(
            items[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap())
        );

        // No heading: link text is the title; date parsed from visible text
        assert_eq!(items[1].title, "Second headline");
        assert_eq!(items[1].link, "https://other.example/blog/second");
        assert_eq!(items[1].description, "");
        assert_eq!(
            items[1].published_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_first_matching_strategy_is_exclusive() {
        // Nothing matches `.primary`; `.secondary` matches two; the `.tertiary`
        // element must not leak in.
        let html = r#"
            <div class="secondary"><a href="/blog/a">Alpha post</a></div>
            <div class="secondary"><a href="/blog/b">Bravo post</a></div>
            <div class="tertiary"><a href="/blog/c">Charlie post</a></div>"#;
        let items = adapter(&[".primary", ".secondary", ".tertiary"]).extract(html);

        let links: Vec<_> = items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://example.com/blog/a", "https://example.com/blog/b"]
        );
    }

    #[test]
    fn test_candidate_without_link_is_skipped() {
        let html = r#"
            <article><h2>No link here</h2></article>
            <article><h2><a href="/blog/ok">Linked article</a></h2></article>"#;
        let items = adapter(&[]).extract(html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Linked article");
    }

    #[test]
    fn test_short_title_is_discarded() {
        let html = r#"
            <article><a href="/blog/x">Go</a></article>
            <article><a href="/blog/y"><h3>  </h3>Readable title</a></article>"#;
        let items = adapter(&[]).extract(html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://example.com/blog/y");
        assert_eq!(items[0].title, "Readable title");
    }

    #[test]
    fn test_anchor_as_candidate() {
        // Mirrors listing pages where the whole card is the link
        let html = r#"
            <a class="resource-card" href="/resources/blog/sanctions-update">
              <h3 class="card-title">Sanctions update</h3>
              <p class="text-sm">What changed this week.</p>
            </a>
            <a class="resource-card" href="/resources/webinars/intro">
              <h3 class="card-title">Intro webinar</h3>
            </a>"#;
        let mut source = source_config(&["a.resource-card[href]"]);
        source.title_selector = Some("h2, h3, .card-title".to_string());
        source.description_selector = Some("p, .card-description, .text-sm".to_string());
        source.link_prefix = Some("/resources/blog/".to_string());
        let items = HtmlAdapter::from_source(&source, 30).unwrap().extract(html);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Sanctions update");
        assert_eq!(items[0].link, "https://example.com/resources/blog/sanctions-update");
        assert_eq!(items[0].description, "What changed this week.");
        assert_eq!(items[0].published_at, None);
    }

    #[test]
    fn test_absolute_link_prefix() {
        let html = r#"
            <article><a href="https://example.com/blog/in">Inside prefix</a></article>
            <article><a href="https://elsewhere.test/blog/out">Outside prefix</a></article>"#;
        let mut source = source_config(&[]);
        source.link_prefix = Some("https://example.com/blog/".to_string());
        let items = HtmlAdapter::from_source(&source, 30).unwrap().extract(html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Inside prefix");
    }

    #[test]
    fn test_default_source_rejects_off_host_cards() {
        let html = r#"
            <a class="resource-card" href="/resources/blog/on-site">
              <h3>On-site post</h3>
            </a>
            <a class="resource-card" href="https://twitter.com/resources/blog/x">
              <h3>Off-site post</h3>
            </a>"#;
        let config = crate::config::Config::default();
        let items = HtmlAdapter::from_source(&config.sources[0], 30)
            .unwrap()
            .extract(html);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "On-site post");
        assert_eq!(
            items[0].link,
            "https://www.trmlabs.com/resources/blog/on-site"
        );
    }

    #[test]
    fn test_nested_matches_count_once() {
        let html = r#"
            <div class="post"><div class="post-item">
              <a href="/blog/one">Only once please</a>
            </div></div>"#;
        let items = adapter(&[]).extract(html);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_content_link_strategy() {
        let html = r#"
            <nav><a href="/about">About us</a><a href="/blog/">Blog</a></nav>
            <ul>
              <li><a href="/blog/2025/launch">We launched</a></li>
              <li><a href="/news/funding">Funding news</a></li>
              <li><a href="mailto:hi@example.com">Email /blog/ team</a></li>
            </ul>"#;
        let items = adapter(&[]).extract(html);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["We launched", "Funding news"]);
    }

    #[test]
    fn test_last_resort_when_strategy_yields_no_items() {
        // `.teaser` matches, but none of its elements hold a usable link
        let html = r#"
            <div class="teaser"><span>Teaser without link</span></div>
            <footer><a href="/posts/hidden-gem">Hidden gem</a></footer>"#;
        let mut source = source_config(&[".teaser"]);
        source.content_paths = vec!["/posts/".to_string()];
        let items = HtmlAdapter::from_source(&source, 30).unwrap().extract(html);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Hidden gem");
        assert_eq!(items[0].link, "https://example.com/posts/hidden-gem");
        assert_eq!(items[0].description, "");
        assert_eq!(items[0].published_at, None);
    }

    #[test]
    fn test_nothing_matches_yields_empty() {
        let html =
            "<html><body><p>Under maintenance</p><a href='/contact'>Contact</a></body></html>";
        assert!(adapter(&[]).extract(html).is_empty());
    }

    #[test]
    fn test_max_items_per_source() {
        let html: String = (0..10)
            .map(|i| format!(r#"<article><a href="/blog/{i}">Story number {i}</a></article>"#))
            .collect();
        let items = HtmlAdapter::from_source(&source_config(&[]), 4).unwrap().extract(&html);
        assert_eq!(items.len(), 4);
        assert_eq!(items[3].link, "https://example.com/blog/3");
    }

    #[test]
    fn test_unparseable_date_is_absent() {
        let html = r#"<article><a href="/blog/x">Some story</a><time>last week</time></article>"#;
        let items = adapter(&[]).extract(html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].published_at, None);
    }

    #[test]
    fn test_invalid_selector_rejected() {
        assert!(HtmlAdapter::from_source(&source_config(&["a[["]), 30).is_err());
    }
}
