//! RSS 2.0 rendering.
//!
//! Rendering is a pure function of the channel metadata, the collection and
//! the build timestamp, so the same inputs always give byte-identical output.
//! All text and attribute values are escaped by the XML writer.

use crate::collection::Collection;
use crate::config::Channel;
use crate::error::{Error, Result};
use crate::models::Item;
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::{self, Write};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Render the collection as an RSS 2.0 document.
pub fn render(
    channel: &Channel,
    collection: &Collection,
    built_at: DateTime<Utc>,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("rss").with_attributes([("version", "2.0")]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    text_element(&mut writer, "title", &channel.title)?;
    text_element(&mut writer, "link", &channel.link)?;
    text_element(&mut writer, "description", &channel.description)?;
    text_element(&mut writer, "lastBuildDate", &built_at.to_rfc2822())?;

    for item in collection.items() {
        write_item(&mut writer, item)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes)
        .map_err(|e| Error::Render(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn write_item<W: Write>(writer: &mut Writer<W>, item: &Item) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;
    text_element(writer, "title", &item.title)?;
    text_element(writer, "link", &item.link)?;
    text_element(writer, "description", &item.description)?;
    text_element(writer, "pubDate", &item.published_at.to_rfc2822())?;

    writer.write_event(Event::Start(
        BytesStart::new("guid").with_attributes([("isPermaLink", "true")]),
    ))?;
    writer.write_event(Event::Text(BytesText::new(&item.link)))?;
    writer.write_event(Event::End(BytesEnd::new("guid")))?;

    writer.write_event(Event::End(BytesEnd::new("item")))
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

/// Write the rendered document, replacing any previous file.
///
/// # Errors
///
/// [`Error::Output`] if the file cannot be written. This is the only fatal
/// failure of a run.
#[instrument(level = "info", skip_all, fields(path = %path.display(), bytes = xml.len()))]
pub async fn write_feed(path: &Path, xml: &str) -> Result<()> {
    fs::write(path, xml).await.map_err(|source| Error::Output {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote feed");
    Ok(())
}
