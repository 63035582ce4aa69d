//! The uniform record type wrapping a raw feed mapping.
//!
//! A [`Record`] wraps the key/value mapping produced by the feed-parse
//! collaborator and papers over the differences between feed formats:
//! the same logical field ("the stories", "the content", "the link",
//! "the update time") may live under different names and shapes
//! depending on whether the source was RSS or Atom. Those four derived
//! fields are synthesized on demand when the backing mapping does not
//! carry them literally.
//!
//! Field lookup order: caller-registered extension delegate, then the
//! backing mapping, then the reserved synthesized fields. Every value
//! handed out passes through [`escape`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDateTime, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::normalize::normalize_with;
use crate::select::longest;
use crate::util::canonicalize_url;
use crate::value::{escape, Value};

/// ISO 8601, the default rendering for the derived `update_time` field.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const SOURCE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from record construction parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The jitter bound must be at least one second.
    #[error("fuzz bound must be a positive number of seconds")]
    ZeroFuzz,
    /// The update-time format string cannot be compiled.
    #[error("unsupported time format: {0}")]
    BadTimeFormat(String),
}

/// Errors from record field access.
#[derive(Debug, Error)]
pub enum FieldError {
    /// The field is absent and no default was supplied.
    #[error("no such field: {0}")]
    NotFound(String),
    /// Fetching a story's source HTML failed.
    #[error("source fetch failed: {0}")]
    Fetch(String),
}

/// Per-record configuration: update-time rendering and jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordConfig {
    time_format: String,
    fuzz_seconds: u32,
    jitter_seed: Option<u64>,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            time_format: DEFAULT_TIME_FORMAT.to_owned(),
            fuzz_seconds: 1,
            jitter_seed: None,
        }
    }
}

impl RecordConfig {
    /// Builds a config, validating both parameters.
    ///
    /// `time_format` takes strftime-style directives and must be
    /// compilable; `fuzz_seconds` bounds the jitter applied to stories
    /// with missing timestamps and must be at least 1.
    pub fn new(time_format: impl Into<String>, fuzz_seconds: u32) -> Result<Self, ConfigError> {
        let time_format = time_format.into();
        if fuzz_seconds == 0 {
            return Err(ConfigError::ZeroFuzz);
        }
        if StrftimeItems::new(&time_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::BadTimeFormat(time_format));
        }
        Ok(Self {
            time_format,
            fuzz_seconds,
            jitter_seed: None,
        })
    }

    /// Pins the jitter to a deterministic generator seeded with `seed`.
    ///
    /// Without a seed the jitter draws from the thread RNG; tests pin
    /// the seed to make `update_time` reproducible.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    pub fn fuzz_seconds(&self) -> u32 {
        self.fuzz_seconds
    }
}

type Delegate = Arc<dyn Fn() -> Value + Send + Sync>;

/// A normalized feed record.
///
/// Cheap to clone, `Send + Sync`, no internal locking — a record is
/// owned by one logical task; callers wanting shared mutation serialize
/// externally.
pub struct Record {
    fields: BTreeMap<String, Value>,
    extensions: BTreeMap<String, Delegate>,
    config: RecordConfig,
    // Derived update_time is stable per instance after first access
    update_time_cache: OnceLock<String>,
}

impl Clone for Record {
    fn clone(&self) -> Self {
        let update_time_cache = OnceLock::new();
        if let Some(cached) = self.update_time_cache.get() {
            let _ = update_time_cache.set(cached.clone());
        }
        Self {
            fields: self.fields.clone(),
            extensions: self.extensions.clone(),
            config: self.config.clone(),
            update_time_cache,
        }
    }
}

impl PartialEq for Record {
    /// Equality is over the backing mapping only; extension delegates
    /// are behavior, not data.
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("fields", &self.fields)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    /// An empty record with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RecordConfig::default())
    }

    pub fn with_config(config: RecordConfig) -> Self {
        Self {
            fields: BTreeMap::new(),
            extensions: BTreeMap::new(),
            config,
            update_time_cache: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &RecordConfig {
        &self.config
    }

    /// Number of fields in the backing mapping.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keys of the backing mapping (derived fields not included).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Raw entries of the backing mapping.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Low-level lookup; `None` means "not found".
    ///
    /// Resolution order: extension delegate, backing mapping, reserved
    /// synthesized fields (`stories`, `content`, `link`, `update_time`
    /// — computed only when the backing mapping lacks the name).
    pub fn try_get(&self, name: &str) -> Option<Value> {
        self.plain_get(name)
            .or_else(|| self.reserved(name))
            .map(escape)
    }

    /// Returns the field value or [`FieldError::NotFound`].
    pub fn get(&self, name: &str) -> Result<Value, FieldError> {
        self.try_get(name)
            .ok_or_else(|| FieldError::NotFound(name.to_owned()))
    }

    /// Returns the field value or the supplied default. Never fails.
    pub fn get_or(&self, name: &str, default: Value) -> Value {
        self.try_get(name).unwrap_or(default)
    }

    /// Whether the field resolves at all (reserved fields always do).
    pub fn contains(&self, name: &str) -> bool {
        self.try_get(name).is_some()
    }

    /// Raw write to the backing mapping. Does not touch extension
    /// delegates — a delegate registered for `name` keeps shadowing it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Removes a field: a registered extension delegate first, else the
    /// backing entry. Fails with [`FieldError::NotFound`] when neither
    /// exists.
    pub fn remove(&mut self, name: &str) -> Result<(), FieldError> {
        if self.extensions.remove(name).is_some() {
            return Ok(());
        }
        if self.fields.remove(name).is_some() {
            return Ok(());
        }
        Err(FieldError::NotFound(name.to_owned()))
    }

    /// Like [`Record::remove`] but swallows the not-found case.
    pub fn safe_remove(&mut self, name: &str) {
        let _ = self.remove(name);
    }

    /// Bulk-merges `incoming` into the backing mapping.
    ///
    /// Each incoming key is first removed safely so a shadowing
    /// extension delegate cannot hide the merged value.
    pub fn update(&mut self, incoming: BTreeMap<String, Value>) {
        for key in incoming.keys() {
            self.safe_remove(key);
        }
        self.fields.extend(incoming);
    }

    /// Installs a computed-field delegate for `name`.
    ///
    /// The delegate receives an immutable snapshot of this record taken
    /// at registration time: later mutations of the live record do not
    /// change what an already-registered delegate sees. Registering a
    /// second delegate under the same name snapshots the record
    /// *including* the first delegate, so delegates can refine each
    /// other.
    pub fn register_extension<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        let snapshot = self.clone();
        self.extensions
            .insert(name.into(), Arc::new(move || func(&snapshot)));
    }

    /// Installs a computed-field delegate with no snapshot.
    ///
    /// The closure's own captures decide what it observes; use this
    /// when the delegate should see live state the caller manages.
    pub fn register_extension_live<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.extensions.insert(name.into(), Arc::new(func));
    }

    /// Backing mapping as JSON (derived fields not materialized).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }

    /// The normalized story list, as records.
    ///
    /// Convenience over `get("stories")` for callers that feed the
    /// result straight into the delta filter.
    pub fn stories(&self) -> Vec<Record> {
        match self.try_get("stories") {
            Some(Value::List(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Record(record) => Some(record),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Fetches the HTML page behind this story's resolved `link`.
    ///
    /// A record with no usable link maps to [`FieldError::NotFound`] so
    /// call sites doing default-substitution degrade gracefully;
    /// transport and HTTP failures surface as [`FieldError::Fetch`].
    pub async fn fetch_source_html(
        &self,
        client: &reqwest::Client,
    ) -> Result<String, FieldError> {
        let link = match self.try_get("link") {
            Some(Value::Text(href)) if !href.is_empty() => href,
            _ => return Err(FieldError::NotFound("link".to_owned())),
        };
        let url = canonicalize_url(&link);

        let response = tokio::time::timeout(SOURCE_FETCH_TIMEOUT, client.get(&url).send())
            .await
            .map_err(|_| FieldError::Fetch("request timed out".to_owned()))?
            .map_err(|e| FieldError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FieldError::Fetch(format!(
                "http status {}",
                response.status().as_u16()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FieldError::Fetch(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // ------------------------------------------------------------------
    // Resolution internals
    // ------------------------------------------------------------------

    /// Extension delegate or backing mapping only — no reserved
    /// recursion. The synthesized computations read their inputs
    /// through this, which keeps e.g. the `content` candidate lookup
    /// well-founded.
    fn plain_get(&self, name: &str) -> Option<Value> {
        if let Some(delegate) = self.extensions.get(name) {
            return Some(escape(delegate()));
        }
        self.fields.get(name).map(|value| escape(value.clone()))
    }

    fn reserved(&self, name: &str) -> Option<Value> {
        match name {
            "stories" => Some(self.compute_stories()),
            "content" => Some(self.compute_content()),
            "link" => Some(self.compute_link()),
            "update_time" => Some(Value::Text(self.compute_update_time())),
            _ => None,
        }
    }

    /// Candidate story list under `key`, or empty when absent or not a
    /// list.
    fn candidate_list(&self, key: &str) -> Value {
        match self.plain_get(key) {
            Some(list @ Value::List(_)) => list,
            Some(_) => {
                tracing::debug!(key, "story candidate is not a sequence, ignoring");
                Value::List(Vec::new())
            }
            None => Value::List(Vec::new()),
        }
    }

    /// The story list may live under `items`, `entries`, or `content`
    /// depending on the feed format; the longest wins, earlier keys win
    /// ties. Every element is normalized.
    fn compute_stories(&self) -> Value {
        let candidates = Value::List(vec![
            self.candidate_list("items"),
            self.candidate_list("entries"),
            self.candidate_list("content"),
        ]);
        // All candidates are lists, so the selector cannot fail
        let raw = match crate::select::longest_of(&candidates) {
            Ok(winner) => winner.clone(),
            Err(_) => return Value::List(Vec::new()),
        };
        let Value::List(raw_stories) = raw else {
            return Value::List(Vec::new());
        };
        Value::List(
            raw_stories
                .into_iter()
                .map(|story| normalize_with(story, &self.config))
                .collect(),
        )
    }

    /// Best guess for the story body: the longest of `content`,
    /// `description`, and `summary`, ties toward the earlier candidate.
    /// A winning payload list (`[{value, type}]`) is unwrapped to its
    /// first element's `value`.
    fn compute_content(&self) -> Value {
        let empty = Value::text("");
        let content = self.plain_get("content").unwrap_or_else(|| empty.clone());
        let description = self
            .plain_get("description")
            .unwrap_or_else(|| empty.clone());
        let summary = self.plain_get("summary").unwrap_or_else(|| empty.clone());

        let best = longest(&content, &description, None).unwrap_or_else(|_| empty.clone());
        let best = longest(&best, &summary, None).unwrap_or_else(|_| best.clone());

        match best {
            // Payload list: unwrap [{value, type}] to the body text
            Value::List(items) => match items.into_iter().next() {
                Some(Value::Record(first)) => {
                    first.plain_get("value").unwrap_or(empty)
                }
                Some(Value::Map(first)) => {
                    first.get("value").cloned().map(escape).unwrap_or(empty)
                }
                _ => empty,
            },
            other => other,
        }
    }

    /// First `links` entry typed `text/html` with an `href`; failing
    /// that, anything with an `href`; failing that, empty.
    fn compute_link(&self) -> Value {
        let links = self
            .plain_get("links")
            .unwrap_or_else(|| Value::List(Vec::new()));
        let Value::List(links) = links else {
            return Value::text("");
        };

        for link in &links {
            let is_html =
                link_attr(link, "type").as_ref().and_then(Value::as_text) == Some("text/html");
            if is_html {
                if let Some(href) = link_attr(link, "href") {
                    return href;
                }
            }
        }
        for link in &links {
            if let Some(href) = link_attr(link, "href") {
                return href;
            }
        }
        Value::text("")
    }

    /// Renders `updated_parsed` with the configured format. Missing or
    /// malformed timestamps are substituted with "now" plus a bounded
    /// random jitter so that many such stories in one feed do not
    /// collapse onto the same instant. The result is clamped so a feed
    /// cannot claim an update time in the future, and cached on the
    /// instance — repeated access is stable.
    fn compute_update_time(&self) -> String {
        if let Some(cached) = self.update_time_cache.get() {
            return cached.clone();
        }

        let now = Utc::now();
        let candidate = match self.fields.get("updated_parsed") {
            Some(Value::Time(parsed)) => self.format_time(*parsed),
            _ => {
                let jitter = chrono::Duration::seconds(self.jitter_seconds());
                self.format_time(now + jitter)
            }
        };

        // Round-trip through the same format; anything that does not
        // parse back is treated as future and clamped
        let final_text = match self.parse_epoch(&candidate) {
            Some(epoch) if epoch <= now.timestamp() => candidate,
            _ => self.format_time(now),
        };

        self.update_time_cache.get_or_init(|| final_text).clone()
    }

    fn format_time(&self, time: DateTime<Utc>) -> String {
        // Format string was validated at config construction
        time.format(&self.config.time_format).to_string()
    }

    fn parse_epoch(&self, text: &str) -> Option<i64> {
        if let Ok(time) = DateTime::parse_from_str(text, &self.config.time_format) {
            return Some(time.timestamp());
        }
        NaiveDateTime::parse_from_str(text, &self.config.time_format)
            .ok()
            .map(|naive| naive.and_utc().timestamp())
    }

    fn jitter_seconds(&self) -> i64 {
        let span = i64::from(self.config.fuzz_seconds);
        match self.config.jitter_seed {
            Some(seed) => SmallRng::seed_from_u64(seed).random_range(-span..=span),
            None => rand::rng().random_range(-span..=span),
        }
    }
}

fn link_attr(link: &Value, name: &str) -> Option<Value> {
    match link {
        Value::Record(record) => record.plain_get(name),
        Value::Map(map) => map.get(name).cloned().map(escape),
        _ => None,
    }
}
