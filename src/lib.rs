//! riffle — normalize RSS/Atom feed data into uniform records.
//!
//! Feed formats disagree about where the interesting data lives: the
//! story list may sit under `items`, `entries`, or `content`; the body
//! under `content`, `description`, or `summary`; timestamps may be
//! missing or claim to come from the future. This crate wraps a parsed
//! feed in a [`Record`] that resolves those differences lazily, and
//! adds the incremental piece most feed consumers end up writing by
//! hand: given the identifier of the newest story already processed,
//! [`filter_new`] returns only what is actually new.
//!
//! ```
//! use std::collections::BTreeMap;
//! use riffle::{normalize, Value};
//!
//! let mut raw = BTreeMap::new();
//! raw.insert("title".to_owned(), Value::text("Example"));
//! let record = match normalize(Value::Map(raw)) {
//!     Value::Record(record) => record,
//!     _ => unreachable!(),
//! };
//! assert_eq!(record.get("title").unwrap(), Value::text("Example"));
//! assert_eq!(record.get("link").unwrap(), Value::text(""));
//! ```
//!
//! Network-facing pieces — [`fetch_feed`] and [`resolve_favicon`] —
//! take a caller-owned `reqwest::Client` and run single-shot under a
//! bounded timeout; everything else is pure and synchronous.

pub mod delta;
pub mod favicon;
pub mod feed;
pub mod normalize;
pub mod record;
pub mod select;
pub mod util;
pub mod value;

pub use delta::filter_new;
pub use favicon::resolve_favicon;
pub use feed::{fetch_feed, FetchError, FetchOptions};
pub use normalize::{normalize, normalize_with};
pub use record::{ConfigError, FieldError, Record, RecordConfig, DEFAULT_TIME_FORMAT};
pub use select::{longest, longest_of, SelectError};
pub use util::canonicalize_url;
pub use value::{escape, Value};
