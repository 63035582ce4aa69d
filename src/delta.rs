//! Incremental story filtering against a caller-held watermark.
//!
//! The caller remembers the identifier of the newest story it has
//! already processed; given a fresh story list in feed order, the
//! filter returns only the stories that come before that watermark.
//! Persistence of the watermark is the caller's business.

use crate::record::Record;
use crate::value::Value;

/// Returns the prefix of `stories` newer than the watermark.
///
/// `identifier` names the field used to recognize the watermark — the
/// title, an id, an update time, anything reasonably unique. Stories
/// are expected in feed order (newest first); everything strictly
/// before the first story whose identifier equals `watermark` is new.
/// A watermark that matches nothing means every story is new.
///
/// When *no* story carries the identifier field at all the filter
/// fails open: it logs a diagnostic and returns the full list rather
/// than silently dropping everything.
pub fn filter_new<'a>(
    stories: &'a [Record],
    identifier: &str,
    watermark: &Value,
) -> &'a [Record] {
    if stories.is_empty() {
        return stories;
    }

    // Parallel identifier list, order-preserving; None marks a story
    // missing the field
    let identifiers: Vec<Option<Value>> = stories
        .iter()
        .map(|story| story.try_get(identifier))
        .collect();

    if identifiers.iter().all(Option::is_none) {
        tracing::warn!(
            identifier,
            "no stories carry the identifier field; returning the full list unfiltered"
        );
        return stories;
    }

    let pivot = identifiers
        .iter()
        .position(|id| id.as_ref() == Some(watermark))
        .unwrap_or(stories.len());

    &stories[..pivot]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(title: &str) -> Record {
        let mut record = Record::new();
        record.set("title", title);
        record
    }

    fn fruit_stories() -> Vec<Record> {
        vec![story("Apple"), story("Bannanna"), story("Grape")]
    }

    #[test]
    fn returns_prefix_before_watermark() {
        let stories = fruit_stories();
        let fresh = filter_new(&stories, "title", &Value::text("Bannanna"));
        assert_eq!(fresh, &[story("Apple")][..]);
    }

    #[test]
    fn unknown_watermark_returns_everything() {
        let stories = fruit_stories();
        let fresh = filter_new(&stories, "title", &Value::text("honeydew"));
        assert_eq!(fresh.len(), 3);
    }

    #[test]
    fn watermark_at_head_returns_nothing() {
        let stories = fruit_stories();
        let fresh = filter_new(&stories, "title", &Value::text("Apple"));
        assert!(fresh.is_empty());
    }

    #[test]
    fn missing_identifier_everywhere_fails_open() {
        let stories = fruit_stories();
        let fresh = filter_new(&stories, "foo", &Value::text("Bannanna"));
        assert_eq!(fresh.len(), 3);
    }

    #[test]
    fn partially_missing_identifier_still_filters() {
        let mut stories = fruit_stories();
        stories[0].remove("title").unwrap();
        let fresh = filter_new(&stories, "title", &Value::text("Grape"));
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn empty_input_returns_empty() {
        let fresh = filter_new(&[], "title", &Value::text("anything"));
        assert!(fresh.is_empty());
    }

    #[test]
    fn comparison_is_value_equality() {
        let mut with_id = Record::new();
        with_id.set("num", Value::Int(2));
        let stories = vec![story("one"), with_id];
        let fresh = filter_new(&stories, "num", &Value::Int(2));
        assert_eq!(fresh.len(), 1);
    }
}
