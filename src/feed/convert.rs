//! Lowers a `feed-rs` parse result into the raw value tree.
//!
//! The output deliberately mirrors the loosely-typed mapping shape the
//! normalizer expects: feed formats disagree about field names and
//! placement, and downstream resolution handles that — this layer just
//! translates faithfully without smoothing anything over.

use std::collections::BTreeMap;

use feed_rs::model::{Entry, Feed, Link};

use crate::value::Value;

pub(crate) fn feed_to_raw(feed: Feed) -> BTreeMap<String, Value> {
    let mut raw = BTreeMap::new();

    if !feed.id.is_empty() {
        raw.insert("id".to_owned(), Value::text(feed.id));
    }
    if let Some(title) = feed.title {
        raw.insert("title".to_owned(), Value::text(title.content));
    }
    if let Some(description) = feed.description {
        raw.insert("description".to_owned(), Value::text(description.content));
    }
    if let Some(language) = feed.language {
        raw.insert("language".to_owned(), Value::text(language));
    }
    if let Some(updated) = feed.updated {
        raw.insert("updated_parsed".to_owned(), Value::Time(updated));
    }
    if !feed.links.is_empty() {
        raw.insert("links".to_owned(), links_to_raw(feed.links));
    }
    raw.insert(
        "entries".to_owned(),
        Value::List(feed.entries.into_iter().map(entry_to_raw).collect()),
    );

    raw
}

fn entry_to_raw(entry: Entry) -> Value {
    let mut raw = BTreeMap::new();

    if !entry.id.is_empty() {
        raw.insert("id".to_owned(), Value::text(entry.id));
    }
    if let Some(title) = entry.title {
        raw.insert("title".to_owned(), Value::text(title.content));
    }
    if let Some(summary) = entry.summary {
        raw.insert("summary".to_owned(), Value::text(summary.content));
    }
    if let Some(content) = entry.content {
        // Entry bodies ship as a payload list of {value, type} mappings
        let content_type = content.content_type.to_string();
        if let Some(body) = content.body {
            let mut payload = BTreeMap::new();
            payload.insert("value".to_owned(), Value::text(body));
            payload.insert("type".to_owned(), Value::text(content_type));
            raw.insert(
                "content".to_owned(),
                Value::List(vec![Value::Map(payload)]),
            );
        }
    }
    if let Some(author) = entry.authors.into_iter().next() {
        raw.insert("author".to_owned(), Value::text(author.name));
    }
    // RSS items only carry pubDate; alias it onto updated_parsed so
    // update-time resolution sees it regardless of feed format
    if let Some(updated) = entry.updated.or(entry.published) {
        raw.insert("updated_parsed".to_owned(), Value::Time(updated));
    }
    if let Some(published) = entry.published {
        raw.insert("published_parsed".to_owned(), Value::Time(published));
    }
    if !entry.links.is_empty() {
        raw.insert("links".to_owned(), links_to_raw(entry.links));
    }
    if !entry.categories.is_empty() {
        raw.insert(
            "categories".to_owned(),
            Value::List(
                entry
                    .categories
                    .into_iter()
                    .map(|category| Value::text(category.term))
                    .collect(),
            ),
        );
    }

    Value::Map(raw)
}

fn links_to_raw(links: Vec<Link>) -> Value {
    Value::List(
        links
            .into_iter()
            .map(|link| {
                let mut raw = BTreeMap::new();
                raw.insert("href".to_owned(), Value::text(link.href));
                if let Some(media_type) = link.media_type {
                    raw.insert("type".to_owned(), Value::text(media_type));
                }
                if let Some(rel) = link.rel {
                    raw.insert("rel".to_owned(), Value::text(rel));
                }
                Value::Map(raw)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <description>A test feed</description>
    <item>
      <title>First</title>
      <link>https://example.com/1</link>
      <guid>item-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
      <description>This is the first item</description>
    </item>
    <item>
      <title>Second</title>
      <link>https://example.com/2</link>
      <guid>item-2</guid>
      <description>This is the second item</description>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Test Feed</title>
  <entry>
    <title>Atom Entry</title>
    <link href="https://example.com/atom1" type="text/html"/>
    <id>atom-entry-1</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <content type="html">&lt;p&gt;full body&lt;/p&gt;</content>
    <summary>short summary</summary>
  </entry>
</feed>"#;

    fn raw_feed(xml: &str) -> BTreeMap<String, Value> {
        feed_to_raw(feed_rs::parser::parse(xml.as_bytes()).unwrap())
    }

    #[test]
    fn rss_feed_carries_title_and_entries() {
        let raw = raw_feed(RSS_SAMPLE);
        assert_eq!(raw.get("title"), Some(&Value::text("Test Feed")));
        assert_eq!(raw.get("description"), Some(&Value::text("A test feed")));

        let Some(Value::List(entries)) = raw.get("entries") else {
            panic!("expected entries list");
        };
        assert_eq!(entries.len(), 2);

        let Value::Map(first) = &entries[0] else {
            panic!("expected raw entry mapping");
        };
        assert_eq!(first.get("title"), Some(&Value::text("First")));
        assert_eq!(first.get("id"), Some(&Value::text("item-1")));
        assert_eq!(
            first.get("summary"),
            Some(&Value::text("This is the first item"))
        );
        assert!(matches!(
            first.get("published_parsed"),
            Some(Value::Time(_))
        ));
        // pubDate is aliased onto updated_parsed as well
        assert!(matches!(first.get("updated_parsed"), Some(Value::Time(_))));
    }

    #[test]
    fn atom_entry_content_becomes_payload_list() {
        let raw = raw_feed(ATOM_SAMPLE);
        let Some(Value::List(entries)) = raw.get("entries") else {
            panic!("expected entries list");
        };
        let Value::Map(entry) = &entries[0] else {
            panic!("expected raw entry mapping");
        };

        let Some(Value::List(payload)) = entry.get("content") else {
            panic!("expected content payload list");
        };
        let Value::Map(first) = &payload[0] else {
            panic!("expected payload mapping");
        };
        assert_eq!(first.get("value"), Some(&Value::text("<p>full body</p>")));
        assert!(matches!(entry.get("updated_parsed"), Some(Value::Time(_))));
    }

    #[test]
    fn links_keep_href_type_and_rel() {
        let raw = raw_feed(ATOM_SAMPLE);
        let Some(Value::List(entries)) = raw.get("entries") else {
            panic!("expected entries list");
        };
        let Value::Map(entry) = &entries[0] else {
            panic!("expected raw entry mapping");
        };
        let Some(Value::List(links)) = entry.get("links") else {
            panic!("expected links list");
        };
        let Value::Map(link) = &links[0] else {
            panic!("expected link mapping");
        };
        assert_eq!(
            link.get("href"),
            Some(&Value::text("https://example.com/atom1"))
        );
        assert_eq!(link.get("type"), Some(&Value::text("text/html")));
    }
}
