//! Recursive normalization of raw parse results.
//!
//! The feed-parse collaborator hands back arbitrarily nested
//! mapping/list/scalar data. `normalize` rewrites that tree into the
//! uniform shape the rest of the crate relies on: every mapping becomes
//! a [`Record`], every list element is normalized recursively, and
//! every scalar is re-encoded through [`escape`]. Sets are left alone —
//! only ordered sequences are recursed into.

use std::collections::BTreeMap;

use crate::record::{Record, RecordConfig};
use crate::value::{escape, Value};

/// Normalizes a value tree using the default record configuration.
///
/// Total over any input and idempotent: already-normalized records pass
/// through unchanged.
pub fn normalize(value: Value) -> Value {
    normalize_with(value, &RecordConfig::default())
}

/// Normalizes a value tree, building records with the given config.
pub fn normalize_with(value: Value, config: &RecordConfig) -> Value {
    match value {
        // Already normalized
        Value::Record(record) => Value::Record(record),
        Value::Map(map) => Value::Record(record_from_map(map, config)),
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(|item| normalize_with(item, config))
                .collect(),
        ),
        // Unordered collections are deliberately not recursed into
        Value::Set(set) => Value::Set(set),
        scalar => escape(scalar),
    }
}

/// Builds a record from a raw mapping, normalizing every value.
pub(crate) fn record_from_map(map: BTreeMap<String, Value>, config: &RecordConfig) -> Record {
    let mut record = Record::with_config(config.clone());
    for (key, value) in map {
        record.set(key, normalize_with(value, config));
    }
    record
}
