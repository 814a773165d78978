//! RSS 2.0 rendering, fresh or accretive.
//!
//! In full mode every article becomes a fresh `<item>`. In accretive mode the
//! previous feed is read only far enough to recover each item's key and its
//! markup; articles whose key is not already present are prepended and the
//! list is capped, dropping the oldest positions first.
//!
//! Item keys are the `<guid>` text (the article id), falling back to `<link>`.

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::HashSet;
use std::error::Error;
use std::io::Write;
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::models::Article;
use crate::utils::{neutralize_cdata, strip_invalid_xml_chars};

const GENERATOR: &str = concat!("edition_feed ", env!("CARGO_PKG_VERSION"));

/// Channel-level metadata.
#[derive(Debug, Clone)]
pub struct ChannelMeta {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    pub self_link: String,
    pub build_date: DateTime<Utc>,
}

impl ChannelMeta {
    pub fn from_config(config: &ChannelConfig, build_date: DateTime<Utc>) -> Self {
        Self {
            title: config.title.clone(),
            link: config.link.clone(),
            description: config.description.clone(),
            language: config.language.clone(),
            self_link: config.self_link.clone(),
            build_date,
        }
    }
}

/// One rendered `<item>`; the markup is opaque once rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub key: String,
    pub fragment: String,
}

#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub channel: ChannelMeta,
    pub items: Vec<FeedItem>,
}

/// Render `articles` (already ordered) into a feed document.
///
/// With a prior document, new articles go in front of the retained items and
/// the result is capped at `max_items`. A prior document that cannot be parsed
/// is ignored with a warning and the feed is rebuilt from `articles`.
pub fn render(
    articles: &[Article],
    prior: Option<&str>,
    channel: ChannelMeta,
    max_items: usize,
) -> Result<FeedDocument, Box<dyn Error>> {
    let retained = match prior.map(parse_items) {
        Some(Ok(items)) => Some(items),
        Some(Err(e)) => {
            warn!(error = %e, "Prior feed is unreadable; rebuilding from scratch");
            None
        }
        None => None,
    };

    let Some(retained) = retained else {
        let items = articles
            .iter()
            .map(|a| render_item(a, channel.build_date))
            .collect::<Result<Vec<_>, _>>()?;
        info!(items = items.len(), "Rendered full feed");
        return Ok(FeedDocument { channel, items });
    };

    let mut seen: HashSet<String> = retained.iter().map(|i| i.key.clone()).collect();
    let mut items = Vec::with_capacity(max_items.min(articles.len() + retained.len()));
    for article in articles {
        if seen.insert(clean(&article.id)) {
            items.push(render_item(article, channel.build_date)?);
        }
    }
    let added = items.len();
    let retained_count = retained.len();
    items.extend(retained);
    items.truncate(max_items);
    info!(
        added,
        retained = retained_count,
        items = items.len(),
        max_items,
        "Rendered accretive feed"
    );
    Ok(FeedDocument { channel, items })
}

/// RFC-822 date as feed readers expect it.
pub fn rfc822(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn clean(s: &str) -> String {
    strip_invalid_xml_chars(s)
}

fn write_text_element<W: Write>(
    w: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), Box<dyn Error>> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(&clean(text))))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Render one article as an `<item>` fragment.
pub fn render_item(article: &Article, build_date: DateTime<Utc>) -> Result<FeedItem, Box<dyn Error>> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(Event::Start(BytesStart::new("item")))?;
    write_text_element(&mut w, "title", &article.title)?;
    write_text_element(&mut w, "link", &article.url)?;

    let description = if article.summary.is_empty() {
        &article.title
    } else {
        &article.summary
    };
    w.write_event(Event::Start(BytesStart::new("description")))?;
    w.write_event(Event::CData(BytesCData::new(neutralize_cdata(&clean(description)))))?;
    w.write_event(Event::End(BytesEnd::new("description")))?;

    write_text_element(
        &mut w,
        "pubDate",
        &rfc822(article.published_at.unwrap_or(build_date)),
    )?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    w.write_event(Event::Start(guid))?;
    w.write_event(Event::Text(BytesText::new(&clean(&article.id))))?;
    w.write_event(Event::End(BytesEnd::new("guid")))?;
    w.write_event(Event::End(BytesEnd::new("item")))?;

    Ok(FeedItem {
        key: clean(&article.id),
        fragment: String::from_utf8(w.into_inner())?,
    })
}

impl FeedDocument {
    /// Serialize the whole document.
    pub fn to_xml(&self) -> Result<String, Box<dyn Error>> {
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        rss.push_attribute(("xmlns:atom", "http://www.w3.org/2005/Atom"));
        w.write_event(Event::Start(rss))?;
        w.write_event(Event::Start(BytesStart::new("channel")))?;

        let ch = &self.channel;
        write_text_element(&mut w, "title", &ch.title)?;
        write_text_element(&mut w, "link", &ch.link)?;
        let mut self_link = BytesStart::new("atom:link");
        self_link.push_attribute(("href", ch.self_link.as_str()));
        self_link.push_attribute(("rel", "self"));
        self_link.push_attribute(("type", "application/rss+xml"));
        w.write_event(Event::Empty(self_link))?;
        write_text_element(&mut w, "description", &ch.description)?;
        write_text_element(&mut w, "language", &ch.language)?;
        write_text_element(&mut w, "lastBuildDate", &rfc822(ch.build_date))?;
        write_text_element(&mut w, "generator", GENERATOR)?;

        for item in &self.items {
            let out = w.get_mut();
            out.write_all(b"\n")?;
            out.write_all(item.fragment.as_bytes())?;
        }

        w.write_event(Event::End(BytesEnd::new("channel")))?;
        w.write_event(Event::End(BytesEnd::new("rss")))?;
        let mut xml = String::from_utf8(w.into_inner())?;
        xml.push('\n');
        Ok(xml)
    }
}

/// Recover `<item>` fragments and their keys from a rendered feed.
pub fn parse_items(xml: &str) -> Result<Vec<FeedItem>, Box<dyn Error>> {
    let mut reader = Reader::from_str(xml);
    let mut items = Vec::new();

    let mut item_start: Option<usize> = None;
    let mut field_start: Option<(String, usize)> = None;
    let mut guid: Option<String> = None;
    let mut link: Option<String> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" && item_start.is_none() {
                    item_start = Some(before + xml[before..after].find('<').unwrap_or(0));
                    guid = None;
                    link = None;
                } else if item_start.is_some() && (name == "guid" || name == "link") {
                    field_start = Some((name, after));
                }
            }
            Event::End(e) => {
                let name = e.name();
                let name = name.as_ref();
                if let Some((field, start)) = field_start.take_if(|(f, _)| f.as_bytes() == name) {
                    let end = start + xml[start..after].rfind("</").unwrap_or(before - start);
                    let text = inner_text(&xml[start..end]);
                    if field == "guid" {
                        guid = Some(text);
                    } else {
                        link = Some(text);
                    }
                } else if name == b"item" {
                    if let Some(start) = item_start.take() {
                        let key = guid.take().filter(|g| !g.is_empty()).or(link.take());
                        match key {
                            Some(key) => items.push(FeedItem {
                                key,
                                fragment: xml[start..after].to_string(),
                            }),
                            None => debug!("Dropping prior item without guid or link"),
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(items)
}

/// Raw element content to plain text: CDATA unwrapped, entities resolved.
fn inner_text(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(body) = raw
        .strip_prefix("<![CDATA[")
        .and_then(|r| r.strip_suffix("]]>"))
    {
        return body.trim().to_string();
    }
    unescape(raw)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| raw.to_string())
}
