//! Atom feed parsing for arXiv API pages.
//!
//! Each `<entry>` becomes one [`PaperRecord`]:
//!
//! | Atom element | Record field |
//! |--------------|--------------|
//! | `id` | `link` (full URL) and `id` (its last path segment) |
//! | `title` | `title`, whitespace runs collapsed |
//! | `summary` | `abstract_text`, trimmed |
//! | `published` | `published_at` (RFC 3339, required) |
//! | `author/name` | `authors`, in feed order |
//! | `category@term` | `categories` |
//! | `link[@title="pdf"]@href` | `pdf_link` |
//!
//! The feed-level `opensearch:totalResults` is reported as
//! [`FeedPage::total_available`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};

use arxiv_harvest_core::error::{Error, Result};
use arxiv_harvest_core::models::PaperRecord;

/// One parsed API page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    pub records: Vec<PaperRecord>,
    /// Matching records upstream, when the feed says.
    pub total_available: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
    TotalResults,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    authors: Vec<String>,
    categories: BTreeSet<String>,
    pdf_link: Option<String>,
}

impl EntryBuilder {
    fn build(self, index: usize) -> Result<PaperRecord> {
        let link = self.id.unwrap_or_default();
        let id = link
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        let published = self
            .published
            .ok_or_else(|| Error::parse(format!("entry {} has no <published>", index)))?;
        let published_at = DateTime::parse_from_rfc3339(published.trim())
            .map_err(|e| {
                Error::parse(format!(
                    "entry {} has invalid <published> '{}': {}",
                    index, published, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(PaperRecord {
            id,
            title: collapse_whitespace(&self.title.unwrap_or_default()),
            abstract_text: self.summary.unwrap_or_default().trim().to_string(),
            published_at,
            link,
            authors: self.authors,
            categories: self.categories,
            pdf_link: self.pdf_link,
            embedding: None,
        })
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|err| Error::parse(err.to_string()))?;
        if a.key.local_name().as_ref() == name {
            let value = a
                .unescape_value()
                .map_err(|err| Error::parse(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Parse one Atom page.
///
/// # Errors
///
/// [`Error::Parse`] for malformed or truncated XML, a document that is not
/// an Atom `<feed>`, or an entry without a valid `<published>` timestamp.
pub fn parse_feed(xml: &str) -> Result<FeedPage> {
    let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut page = FeedPage::default();
    let mut saw_feed = false;
    let mut feed_closed = false;
    let mut entry: Option<EntryBuilder> = None;
    let mut in_author = false;
    let mut capture: Option<Capture> = None;
    let mut text = String::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            Error::parse(format!(
                "XML error at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = e.local_name();
                match (name.as_ref(), entry.is_some()) {
                    (b"feed", false) => saw_feed = true,
                    (b"totalResults", false) => capture = Some(Capture::TotalResults),
                    (b"entry", false) => entry = Some(EntryBuilder::default()),
                    (b"id", true) => capture = Some(Capture::Id),
                    (b"title", true) => capture = Some(Capture::Title),
                    (b"summary", true) => capture = Some(Capture::Summary),
                    (b"published", true) => capture = Some(Capture::Published),
                    (b"author", true) => in_author = true,
                    (b"name", true) if in_author => capture = Some(Capture::AuthorName),
                    (b"category", true) | (b"link", true) => {
                        if let Some(builder) = entry.as_mut() {
                            apply_empty_element(builder, &e)?;
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::Empty(e) => {
                if let Some(builder) = entry.as_mut() {
                    apply_empty_element(builder, &e)?;
                }
            }
            Event::Text(t) if capture.is_some() => {
                let unescaped = t.unescape().map_err(|e| Error::parse(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::CData(c) if capture.is_some() => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"entry" => {
                        if let Some(builder) = entry.take() {
                            let record = builder.build(page.records.len())?;
                            page.records.push(record);
                        }
                        in_author = false;
                    }
                    b"author" => in_author = false,
                    b"feed" if entry.is_none() => feed_closed = true,
                    _ => {}
                }
                if let Some(field) = capture.take() {
                    let value = std::mem::take(&mut text);
                    match (field, entry.as_mut()) {
                        (Capture::TotalResults, _) => {
                            page.total_available = value.trim().parse().ok();
                        }
                        (Capture::Id, Some(b)) => b.id = Some(value.trim().to_string()),
                        (Capture::Title, Some(b)) => b.title = Some(value),
                        (Capture::Summary, Some(b)) => b.summary = Some(value),
                        (Capture::Published, Some(b)) => b.published = Some(value),
                        (Capture::AuthorName, Some(b)) => b.authors.push(value.trim().to_string()),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_feed {
        return Err(Error::parse("document is not an Atom <feed>"));
    }
    // quick-xml reports Eof without complaint on unclosed elements.
    if entry.is_some() {
        return Err(Error::parse(format!(
            "truncated feed: entry {} is not closed",
            page.records.len()
        )));
    }
    if !feed_closed {
        return Err(Error::parse("truncated feed: missing </feed>"));
    }
    Ok(page)
}

/// `<category term=..>` and `<link title="pdf" href=..>` carry their data in attributes.
fn apply_empty_element(builder: &mut EntryBuilder, e: &BytesStart<'_>) -> Result<()> {
    match e.local_name().as_ref() {
        b"category" => {
            if let Some(term) = attr(e, b"term")? {
                builder.categories.insert(term);
            }
        }
        b"link" => {
            if builder.pdf_link.is_none() && attr(e, b"title")?.as_deref() == Some("pdf") {
                builder.pdf_link = attr(e, b"href")?;
            }
        }
        _ => {}
    }
    Ok(())
}
