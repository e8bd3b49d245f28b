//! Structured adapter for RSS 2.0, RSS 1.0 (RDF) and Atom documents.
//!
//! The document's root element decides which shape it is deserialized into.
//! Entries without a title or a link are dropped, and timestamps that do
//! not parse are left empty for the normalizer to fill in.

use crate::dates::parse_feed_date;
use crate::error::SourceUnavailable;
use crate::models::RawItem;
use crate::utils::{collapse_whitespace, truncate_for_log};
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use regex::{Captures, Regex};
use scraper::Html;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

/// RSS 1.0 keeps its items next to the channel rather than inside it.
#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

/// Namespace prefixes are dropped during deserialization, so `<atom:link>`
/// lands in `links` and `<media:title>` in `titles`. Every field that an
/// extension namespace commonly reuses is therefore a list.
#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(rename = "title", default)]
    titles: Vec<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<TextNode>,
    #[serde(rename = "description", default)]
    descriptions: Vec<TextNode>,
    #[serde(rename = "pubDate", default)]
    pub_dates: Vec<TextNode>,
    /// `<dc:date>`, mostly seen in RSS 1.0.
    #[serde(rename = "date", default)]
    dc_dates: Vec<TextNode>,
    #[serde(rename = "guid", default)]
    guids: Vec<Guid>,
}

/// Text content of an element whose attributes are irrelevant.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

/// First non-blank text among repeated elements.
fn first_text(nodes: &[TextNode]) -> Option<&str> {
    nodes.iter().map(|n| n.value.trim()).find(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "@isPermaLink")]
    is_permalink: Option<String>,
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(rename = "title", default)]
    titles: Vec<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(rename = "summary", default)]
    summaries: Vec<TextNode>,
    #[serde(rename = "published", default)]
    published: Vec<TextNode>,
    #[serde(rename = "updated", default)]
    updated: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    /// The `alternate` link, which is also what a link without `rel` means.
    fn canonical_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.links.first())
            .and_then(|l| l.href.as_deref())
    }
}

impl RssItem {
    fn canonical_link(&self) -> Option<&str> {
        first_text(&self.links).or_else(|| {
            // A permalink guid stands in for a missing <link>
            self.guids
                .iter()
                .filter(|g| g.is_permalink.as_deref() != Some("false"))
                .map(|g| g.value.trim())
                .find(|v| v.starts_with("http://") || v.starts_with("https://"))
        })
    }
}

/// Adapter for sources that already publish a feed.
#[derive(Debug)]
pub struct FeedAdapter {
    url: String,
    max_items: usize,
}

impl FeedAdapter {
    pub fn new(url: &str, max_items: usize) -> Self {
        Self {
            url: url.to_string(),
            max_items,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Parse a feed document into raw items.
    ///
    /// # Errors
    ///
    /// [`SourceUnavailable::Parse`] when the document is not a feed at all.
    pub fn extract(&self, document: &str) -> Result<Vec<RawItem>, SourceUnavailable> {
        let xml = scrub_html_entities_for_xml(document.trim_start_matches('\u{feff}'));

        let items = match root_name(&xml).as_deref() {
            Some("rss") => {
                let rss: Rss = from_str(&xml).map_err(parse_error)?;
                rss.channel.items.into_iter().filter_map(rss_item).collect::<Vec<_>>()
            }
            Some("RDF") => {
                let rdf: Rdf = from_str(&xml).map_err(parse_error)?;
                rdf.items.into_iter().filter_map(rss_item).collect()
            }
            Some("feed") => {
                let atom: AtomFeed = from_str(&xml).map_err(parse_error)?;
                atom.entries.into_iter().filter_map(atom_entry).collect()
            }
            Some(other) => {
                warn!(root = other, url = %self.url, "Unrecognized feed root element");
                return Err(SourceUnavailable::Parse(format!(
                    "unrecognized root element <{other}>"
                )));
            }
            None => {
                warn!(
                    url = %self.url,
                    preview = %truncate_for_log(document, 120),
                    "Document has no root element"
                );
                return Err(SourceUnavailable::Parse("no root element".to_string()));
            }
        };

        debug!(url = %self.url, count = items.len(), "Parsed feed entries");
        Ok(items.into_iter().take(self.max_items).collect())
    }
}

fn parse_error(e: quick_xml::de::DeError) -> SourceUnavailable {
    SourceUnavailable::Parse(e.to_string())
}

fn rss_item(item: RssItem) -> Option<RawItem> {
    let title = collapse_whitespace(first_text(&item.titles).unwrap_or_default());
    let Some(link) = item.canonical_link().map(str::to_string) else {
        debug!(%title, "Dropping feed item without a link");
        return None;
    };
    if title.is_empty() {
        debug!(%link, "Dropping feed item without a title");
        return None;
    }

    let published_at = first_text(&item.pub_dates)
        .or(first_text(&item.dc_dates))
        .and_then(parse_feed_date);
    let description = first_text(&item.descriptions).map(plain_text).unwrap_or_default();

    Some(
        RawItem::new(title, link)
            .with_description(description)
            .with_published_at(published_at),
    )
}

fn atom_entry(entry: AtomEntry) -> Option<RawItem> {
    let title = first_text(&entry.titles).map(plain_text).unwrap_or_default();
    let link = entry.canonical_link().map(|l| l.trim().to_string())?;
    if title.is_empty() || link.is_empty() {
        debug!(%link, "Dropping incomplete Atom entry");
        return None;
    }

    let published_at = first_text(&entry.published)
        .or(first_text(&entry.updated))
        .and_then(parse_feed_date);
    let description = first_text(&entry.summaries).map(plain_text).unwrap_or_default();

    Some(
        RawItem::new(title, link)
            .with_description(description)
            .with_published_at(published_at),
    )
}

/// Feed summaries frequently carry escaped HTML; keep only its text.
fn plain_text(s: &str) -> String {
    if s.contains(['<', '&']) {
        let fragment = Html::parse_fragment(s);
        collapse_whitespace(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
    } else {
        collapse_whitespace(s)
    }
}

/// Local name of the first element in the document.
fn root_name(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("entity pattern is valid"));

/// HTML named entities seen in feeds, as Unicode code points.
#[rustfmt::skip]
const HTML_ENTITIES: &[(&str, u32)] = &[
    ("nbsp", 160), ("iexcl", 161), ("cent", 162), ("pound", 163), ("yen", 165),
    ("sect", 167), ("copy", 169), ("laquo", 171), ("reg", 174), ("deg", 176),
    ("plusmn", 177), ("para", 182), ("middot", 183), ("raquo", 187), ("iquest", 191),
    ("Agrave", 192), ("Aacute", 193), ("Acirc", 194), ("Atilde", 195), ("Auml", 196),
    ("Aring", 197), ("AElig", 198), ("Ccedil", 199), ("Egrave", 200), ("Eacute", 201),
    ("Ntilde", 209), ("Ouml", 214), ("times", 215), ("Oslash", 216), ("Uuml", 220),
    ("szlig", 223), ("agrave", 224), ("aacute", 225), ("acirc", 226), ("atilde", 227),
    ("auml", 228), ("aring", 229), ("aelig", 230), ("ccedil", 231), ("egrave", 232),
    ("eacute", 233), ("ecirc", 234), ("euml", 235), ("iacute", 237), ("iuml", 239),
    ("ntilde", 241), ("oacute", 243), ("ocirc", 244), ("otilde", 245), ("ouml", 246),
    ("divide", 247), ("oslash", 248), ("uacute", 250), ("uuml", 252),
    ("ndash", 8211), ("mdash", 8212), ("lsquo", 8216), ("rsquo", 8217), ("sbquo", 8218),
    ("ldquo", 8220), ("rdquo", 8221), ("bdquo", 8222), ("dagger", 8224), ("Dagger", 8225),
    ("bull", 8226), ("hellip", 8230), ("permil", 8240), ("prime", 8242), ("euro", 8364),
    ("trade", 8482), ("larr", 8592), ("uarr", 8593), ("rarr", 8594), ("darr", 8595),
];

/// Rewrite HTML named entities, which XML does not define, as numeric
/// character references. Names outside the table are kept as literal text.
/// CDATA sections are copied untouched.
fn scrub_html_entities_for_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("<![CDATA[") {
        out.push_str(&rewrite_entities(&rest[..start]));
        let cdata = &rest[start..];
        let end = cdata.find("]]>").map_or(cdata.len(), |i| i + 3);
        out.push_str(&cdata[..end]);
        rest = &cdata[end..];
    }
    out.push_str(&rewrite_entities(rest));
    out
}

fn rewrite_entities(s: &str) -> String {
    NAMED_ENTITY
        .replace_all(s, |caps: &Captures<'_>| {
            let name = &caps[1];
            if matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
                return caps[0].to_string();
            }
            match HTML_ENTITIES.iter().find(|(n, _)| *n == name) {
                Some((_, code)) => format!("&#{code};"),
                None => format!("&amp;{name};"),
            }
        })
        .into_owned()
}
