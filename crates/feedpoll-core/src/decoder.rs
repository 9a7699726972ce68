//! Feed decoding
//!
//! Turns a raw response body into the channel title and the dated items of
//! an RSS document, in document order.
//!
//! ## Steps
//!
//! 1. Salvage the bytes into text (invalid UTF-8 replaced, XML-illegal
//!    characters dropped). Never fails.
//! 2. Parse the text into an element tree. Fails with
//!    [`DecodeError::MalformedFeed`].
//! 3. Locate `channel` under the root element. Fails with
//!    [`DecodeError::InvalidFeedStructure`].
//! 4. Collect `channel > item` entries. Items without `pubDate` are skipped.
//!
//! Element names are matched by local name, so namespace prefixes are
//! ignored.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::DecodeError;
use crate::timestamp::parse_pub_date;

/// Maximum element nesting accepted before the document is rejected
const MAX_DEPTH: usize = 64;

/// One dated feed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Item title, empty when absent
    pub title: String,
    /// Item link, empty when absent
    pub link: String,
    /// Publish time in seconds since the Unix epoch (best effort)
    pub published_at: i64,
}

impl FeedEntry {
    pub fn new(title: impl Into<String>, link: impl Into<String>, published_at: i64) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published_at,
        }
    }
}

/// Decoded channel contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFeed {
    /// Channel title, empty when absent
    pub title: String,
    /// Dated items in document order (newest first by RSS convention)
    pub entries: Vec<FeedEntry>,
    /// Number of items skipped for lacking a `pubDate`
    pub undated_items: usize,
}

/// Decode a raw feed body
pub fn decode(raw: &[u8]) -> Result<DecodedFeed, DecodeError> {
    let text = salvage_text(raw);
    let root = parse_tree(&text)?;

    let channel = root
        .child("channel")
        .ok_or(DecodeError::InvalidFeedStructure)?;

    let title = channel.child_text("title");

    let mut entries = Vec::new();
    let mut undated_items = 0;
    for item in channel.children_named("item") {
        let Some(pub_date) = item.child("pubDate") else {
            undated_items += 1;
            continue;
        };

        entries.push(FeedEntry {
            title: item.child_text("title"),
            link: item.child_text("link"),
            published_at: parse_pub_date(&pub_date.text()),
        });
    }

    if entries.is_empty() {
        tracing::debug!("Channel '{}' has no dated items", title);
    }

    Ok(DecodedFeed {
        title,
        entries,
        undated_items,
    })
}

/// Convert arbitrary bytes into text that can be handed to the XML parser
pub fn salvage_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| is_xml_char(*c))
        .collect()
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

/// A parsed markup element
#[derive(Debug, Default)]
struct Element {
    name: String,
    /// Direct text and CDATA content, concatenated
    content: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Self::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn text(&self) -> String {
        self.content.trim().to_string()
    }

    fn child_text(&self, name: &str) -> String {
        self.child(name).map(Element::text).unwrap_or_default()
    }
}

fn malformed(msg: impl Into<String>) -> DecodeError {
    DecodeError::MalformedFeed(msg.into())
}

/// Parse text into a single-rooted element tree
fn parse_tree(text: &str) -> Result<Element, DecodeError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().check_end_names = true;

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(format!("at byte {}: {}", reader.error_position(), e)))?;

        match event {
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(malformed("multiple root elements"));
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(malformed(format!(
                        "nesting deeper than {} elements",
                        MAX_DEPTH
                    )));
                }
                stack.push(Element::from_start(&start));
            }
            Event::Empty(start) => {
                close_element(Element::from_start(&start), &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| malformed("closing tag without opening tag"))?;
                close_element(element, &mut stack, &mut root)?;
            }
            Event::Text(t) => {
                let decoded = match t.unescape() {
                    Ok(s) => s.into_owned(),
                    Err(e) => {
                        tracing::debug!("Keeping raw text after unescape failure: {}", e);
                        String::from_utf8_lossy(&t).into_owned()
                    }
                };
                append_text(&decoded, &mut stack)?;
            }
            Event::CData(c) => {
                append_text(&String::from_utf8_lossy(&c), &mut stack)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| malformed("no root element"))
}

fn close_element(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(malformed("multiple root elements")),
        None => *root = Some(element),
    }
    Ok(())
}

fn append_text(text: &str, stack: &mut [Element]) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(element) => element.content.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err(malformed("text outside the root element")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Example &amp; Co</title>
    <atom:link href="https://example.com/feed" rel="self"/>
    <item>
      <title>Second post</title>
      <link>https://example.com/2</link>
      <pubDate>Sun, 10 Mar 2024 12:00:00 +0000</pubDate>
    </item>
    <item>
      <title><![CDATA[First <b>post</b>]]></title>
      <link>https://example.com/1</link>
      <pubDate>Sat, 09 Mar 2024 08:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn decodes_channel_title_and_items_in_order() {
        let feed = decode(SAMPLE.as_bytes()).unwrap();

        assert_eq!(feed.title, "Example & Co");
        assert_eq!(
            feed.entries,
            vec![
                FeedEntry::new("Second post", "https://example.com/2", 1_710_072_000),
                FeedEntry::new("First <b>post</b>", "https://example.com/1", 1_709_971_200),
            ]
        );
        assert_eq!(feed.undated_items, 0);
    }

    #[test]
    fn empty_channel_is_not_an_error() {
        let feed = decode(b"<rss><channel><title>Quiet</title></channel></rss>").unwrap();
        assert_eq!(feed.title, "Quiet");
        assert!(feed.entries.is_empty());
    }

    #[test]
    fn missing_title_and_link_default_to_empty() {
        let xml = b"<rss><channel><item><pubDate>Sun, 10 Mar 2024 12:00:00 +0000</pubDate></item></channel></rss>";
        let feed = decode(xml).unwrap();

        assert_eq!(feed.title, "");
        assert_eq!(feed.entries, vec![FeedEntry::new("", "", 1_710_072_000)]);
    }

    #[test]
    fn undated_items_are_skipped() {
        let xml = b"<rss><channel>\
            <item><title>no date</title></item>\
            <item><title>dated</title><pubDate>Sun, 10 Mar 2024 12:00:00 +0000</pubDate></item>\
            </channel></rss>";
        let feed = decode(xml).unwrap();

        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].title, "dated");
        assert_eq!(feed.undated_items, 1);
    }

    #[test]
    fn plain_text_is_malformed() {
        assert!(matches!(
            decode(b"not xml at all"),
            Err(DecodeError::MalformedFeed(_))
        ));
    }

    #[test]
    fn empty_body_is_malformed() {
        assert!(matches!(decode(b""), Err(DecodeError::MalformedFeed(_))));
    }

    #[test]
    fn mismatched_and_unclosed_tags_are_malformed() {
        assert!(matches!(
            decode(b"<rss><channel></rss>"),
            Err(DecodeError::MalformedFeed(_))
        ));
        assert!(matches!(
            decode(b"<rss><channel>"),
            Err(DecodeError::MalformedFeed(_))
        ));
    }

    #[test]
    fn multiple_roots_are_malformed() {
        assert!(matches!(
            decode(b"<rss></rss><rss></rss>"),
            Err(DecodeError::MalformedFeed(_))
        ));
    }

    #[test]
    fn excessive_nesting_is_malformed() {
        let xml = format!("{}{}", "<a>".repeat(MAX_DEPTH + 1), "</a>".repeat(MAX_DEPTH + 1));
        assert!(matches!(
            decode(xml.as_bytes()),
            Err(DecodeError::MalformedFeed(_))
        ));
    }

    #[test]
    fn missing_channel_is_invalid_structure() {
        assert_eq!(
            decode(b"<feed><entry/></feed>"),
            Err(DecodeError::InvalidFeedStructure)
        );
        assert_eq!(decode(b"<rss/>"), Err(DecodeError::InvalidFeedStructure));
    }

    #[test]
    fn nested_channel_is_not_found() {
        assert_eq!(
            decode(b"<rss><wrapper><channel/></wrapper></rss>"),
            Err(DecodeError::InvalidFeedStructure)
        );
    }

    #[test]
    fn invalid_bytes_are_salvaged() {
        let mut body = b"<rss><channel><title>Caf".to_vec();
        body.extend_from_slice(&[0xC3, 0x28, 0x00]);
        body.extend_from_slice(b"</title></channel></rss>");

        let feed = decode(&body).unwrap();
        assert!(feed.title.starts_with("Caf"));
        assert!(!feed.title.contains('\0'));
    }

    #[test]
    fn unknown_entities_keep_raw_text() {
        let feed = decode(b"<rss><channel><title>A&nbsp;B</title></channel></rss>").unwrap();
        assert_eq!(feed.title, "A&nbsp;B");
    }
}
