/// Best-effort rewriting of a loosely-formed URL into a fetchable one.
///
/// - surrounding whitespace is trimmed;
/// - literal `#` characters are percent-encoded — fragments are a
///   browser concept and break feed fetching;
/// - a `feed://` prefix (how some browsers expose subscriptions) is
///   rewritten to `http://`;
/// - a missing scheme defaults to `http://`.
///
/// Pure string rewriting, no network access, never fails.
pub fn canonicalize_url(url: &str) -> String {
    let mut url = url.trim().replace('#', "%23");

    if let Some(rest) = url.strip_prefix("feed://") {
        url = format!("http://{rest}");
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("http://{url}");
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_fragment_markers() {
        assert_eq!(
            canonicalize_url("http://reddit.com/.rss#top"),
            "http://reddit.com/.rss%23top"
        );
    }

    #[test]
    fn rewrites_feed_scheme() {
        assert_eq!(
            canonicalize_url("feed://reddit.com/.rss"),
            "http://reddit.com/.rss"
        );
    }

    #[test]
    fn defaults_missing_scheme_to_http() {
        assert_eq!(
            canonicalize_url("reddit.com/.rss"),
            "http://reddit.com/.rss"
        );
    }

    #[test]
    fn leaves_well_formed_urls_alone() {
        assert_eq!(
            canonicalize_url("http://reddit.com/.rss"),
            "http://reddit.com/.rss"
        );
        assert_eq!(
            canonicalize_url("https://example.com/feed.xml"),
            "https://example.com/feed.xml"
        );
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(
            canonicalize_url("  https://example.com/feed \n"),
            "https://example.com/feed"
        );
    }
}
