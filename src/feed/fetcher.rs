use std::collections::BTreeMap;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
    REFERER, USER_AGENT,
};
use thiserror::Error;

use crate::feed::convert::feed_to_raw;
use crate::normalize::record_from_map;
use crate::record::{Record, RecordConfig};
use crate::util::canonicalize_url;
use crate::value::Value;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching and parsing a feed.
///
/// These propagate to the caller by contract: the normalization core
/// only covers data that actually arrived.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("http error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("parse error: {0}")]
    Parse(String),
    /// A pass-through option could not be encoded as an HTTP header
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
    /// Response body exceeded the 10MB size limit
    #[error("response too large")]
    ResponseTooLarge,
}

/// Pass-through identification and caching parameters for a fetch.
///
/// `etag` and `last_modified` enable conditional requests: hand back
/// the values from a previous fetch's record and an unchanged feed
/// answers 304 instead of a full body. `record` configures the records
/// built from the result.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub request_headers: Vec<(String, String)>,
    pub record: RecordConfig,
}

/// Fetches a feed URL and normalizes the parse result into a [`Record`].
///
/// The URL is canonicalized first, so loosely-formed input (`feed://`
/// prefixes, missing schemes, stray fragments) still fetches. The
/// returned record carries response metadata under `status`, `href`
/// (the final URL after redirects), `etag`, and `last_modified`; a 304
/// Not Modified answer is a success with an empty `entries` list.
///
/// # Errors
///
/// [`FetchError`] on network failure, timeout, non-2xx status,
/// oversized response, or unparseable feed XML. None of these are
/// swallowed — retry policy belongs to the caller.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<Record, FetchError> {
    let url = canonicalize_url(url);
    let headers = build_headers(options)?;

    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(&url).headers(headers).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    let status = response.status();
    let final_url = response.url().to_string();
    let etag = header_text(response.headers(), ETAG);
    let last_modified = header_text(response.headers(), LAST_MODIFIED);

    if status == reqwest::StatusCode::NOT_MODIFIED {
        tracing::debug!(url = %final_url, "feed not modified since last fetch");
        let mut raw = BTreeMap::new();
        raw.insert("entries".to_owned(), Value::List(Vec::new()));
        return Ok(finish_record(
            raw,
            status.as_u16(),
            final_url,
            etag,
            last_modified,
            &options.record,
        ));
    }

    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    let feed =
        feed_rs::parser::parse(bytes.as_slice()).map_err(|e| FetchError::Parse(e.to_string()))?;

    Ok(finish_record(
        feed_to_raw(feed),
        status.as_u16(),
        final_url,
        etag,
        last_modified,
        &options.record,
    ))
}

/// Attaches response metadata and normalizes the raw tree.
fn finish_record(
    mut raw: BTreeMap<String, Value>,
    status: u16,
    final_url: String,
    etag: Option<String>,
    last_modified: Option<String>,
    config: &RecordConfig,
) -> Record {
    raw.insert("status".to_owned(), Value::Int(i64::from(status)));
    raw.insert("href".to_owned(), Value::text(final_url));
    if let Some(etag) = etag {
        raw.insert("etag".to_owned(), Value::text(etag));
    }
    if let Some(last_modified) = last_modified {
        raw.insert("last_modified".to_owned(), Value::text(last_modified));
    }
    record_from_map(raw, config)
}

fn build_headers(options: &FetchOptions) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();

    if let Some(etag) = &options.etag {
        headers.insert(IF_NONE_MATCH, header_value(etag)?);
    }
    if let Some(last_modified) = &options.last_modified {
        headers.insert(IF_MODIFIED_SINCE, header_value(last_modified)?);
    }
    if let Some(user_agent) = &options.user_agent {
        headers.insert(USER_AGENT, header_value(user_agent)?);
    }
    if let Some(referrer) = &options.referrer {
        headers.insert(REFERER, header_value(referrer)?);
    }
    for (name, value) in &options.request_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

fn header_value(text: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(text).map_err(|_| FetchError::InvalidHeader(text.to_owned()))
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Reads a response body with a size limit using stream-based reading.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
