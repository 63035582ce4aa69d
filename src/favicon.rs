//! Favicon resolution for feed pages.
//!
//! Scans a page's HTML for icon `<link>` tags; when anything at all
//! goes wrong — timeout, transport error, bad status, oversized or
//! undecodable body, no matching tag — the resolver answers with the
//! conventional `scheme://host/favicon.ico` guess instead of failing.
//! Callers always get *a* URL back.

use std::time::Duration;

use futures::StreamExt;

use crate::util::canonicalize_url;

const FAVICON_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_PAGE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// `rel` values that mark an icon link, in no particular priority —
/// document order decides
const ICON_RELS: [&str; 3] = ["apple-touch-icon", "shortcut icon", "icon"];

/// Resolves the favicon URL for a page.
///
/// Fetches `url`'s HTML with a bounded timeout and returns the `href`
/// of the first `<link>` tag whose `rel` is one of `apple-touch-icon`,
/// `shortcut icon`, or `icon`, resolved against the page URL. Every
/// failure class falls back to `scheme://host/favicon.ico`.
pub async fn resolve_favicon(client: &reqwest::Client, url: &str) -> String {
    let page_url = canonicalize_url(url);
    let fallback = default_favicon(&page_url);

    let html = match fetch_page(client, &page_url).await {
        Ok(html) => html,
        Err(reason) => {
            tracing::debug!(url = %page_url, reason = %reason, "favicon page fetch failed, using fallback");
            return fallback;
        }
    };

    find_icon_link_in_html(&html, &page_url).unwrap_or(fallback)
}

/// The "dumbest" guess: `/favicon.ico` at the site root.
fn default_favicon(page_url: &str) -> String {
    match url::Url::parse(page_url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            match parsed.port() {
                Some(port) => format!("{}://{}:{}/favicon.ico", parsed.scheme(), host, port),
                None => format!("{}://{}/favicon.ico", parsed.scheme(), host),
            }
        }
        Err(_) => format!("{}/favicon.ico", page_url.trim_end_matches('/')),
    }
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let response = tokio::time::timeout(FAVICON_TIMEOUT, client.get(url).send())
        .await
        .map_err(|_| "request timed out".to_owned())?
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("http status {}", response.status().as_u16()));
    }

    let bytes = read_page_bytes(response).await?;
    // Lossy decoding: a page with broken encoding still gets scanned
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads the page body with a 5MB size limit using stream-based reading.
async fn read_page_bytes(response: reqwest::Response) -> Result<Vec<u8>, String> {
    if let Some(len) = response.content_length() {
        if len as usize > MAX_PAGE_SIZE {
            return Err("response too large".to_owned());
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        if bytes.len().saturating_add(chunk.len()) > MAX_PAGE_SIZE {
            return Err("response too large".to_owned());
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// Scans HTML for icon `<link>` tags in document order.
///
/// Uses simple string scanning (no HTML parser dependency). Extracts
/// `href` from the original casing and resolves relative URLs against
/// the page URL. Returns the first match, or `None`.
fn find_icon_link_in_html(html: &str, base_url: &str) -> Option<String> {
    let html_lower = html.to_lowercase();
    let mut search_from = 0;

    while let Some(link_start) = html_lower[search_from..].find("<link") {
        let abs_start = search_from + link_start;
        let remaining = &html_lower[abs_start..];

        let tag_end = match remaining.find('>') {
            Some(pos) => pos,
            None => break,
        };
        let tag = &remaining[..=tag_end];

        if is_icon_rel(tag) {
            // Extract href from the original (non-lowered) HTML to preserve URL case
            if let Some(original_tag) = html.get(abs_start..abs_start + tag_end + 1) {
                if let Some(href) = extract_attr_value(original_tag, "href") {
                    return Some(resolve_href(href.trim(), base_url));
                }
            }
        }

        search_from = abs_start + tag_end + 1;
    }

    None
}

/// Checks whether a lowercased `<link>` tag's `rel` marks an icon.
fn is_icon_rel(tag: &str) -> bool {
    match extract_attr_value(tag, "rel") {
        Some(rel) => ICON_RELS.contains(&rel.trim()),
        None => false,
    }
}

/// Extracts the value of an attribute from a tag string (case-preserving).
fn extract_attr_value<'a>(tag: &'a str, attr_name: &str) -> Option<&'a str> {
    let tag_lower = tag.to_lowercase();
    let attr_prefix = format!("{attr_name}=");

    let attr_start = tag_lower.find(&attr_prefix)?;
    let value_start = attr_start + attr_prefix.len();

    if value_start >= tag.len() {
        return None;
    }

    let rest = &tag[value_start..];
    let quote = rest.as_bytes().first()?;

    if *quote != b'"' && *quote != b'\'' {
        return None;
    }

    let quote_char = *quote as char;
    let inner = &rest[1..];
    let end = inner.find(quote_char)?;

    Some(&inner[..end])
}

/// Resolves a potentially relative href against the page URL.
fn resolve_href(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }

    // Protocol-relative: normalize through the URL parser
    if href.starts_with("//") {
        let with_scheme = format!("https:{}", href);
        if let Ok(parsed) = url::Url::parse(&with_scheme) {
            return parsed.to_string();
        }
    }

    if let Ok(base) = url::Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }

    href.to_owned()
}
