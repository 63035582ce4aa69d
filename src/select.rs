//! Longest-element selection.
//!
//! Feed formats scatter the same logical data across differently-named
//! fields; picking the "best" candidate usually means picking the
//! longest one. Ties always go to the earlier candidate so that field
//! precedence stays deterministic.

use thiserror::Error;

use crate::value::Value;

/// Errors from the longest-element selectors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    /// Neither operand (or a list element) has a length concept.
    #[error("neither element has a length")]
    NoLength,
    /// The list form was handed something other than a sequence.
    #[error("expected a sequence of elements")]
    NotASequence,
    /// The list form was handed a sequence with no elements.
    #[error("cannot select from an empty sequence")]
    EmptyList,
}

/// Returns the longer of two values; ties go to `a`.
///
/// If exactly one operand has a length concept, that operand wins. If
/// neither has one, the result depends on `fallback`: `None` raises
/// [`SelectError::NoLength`], while `Some(value)` returns that value
/// itself — an escape hatch for callers that want a default instead of
/// an error.
pub fn longest(a: &Value, b: &Value, fallback: Option<Value>) -> Result<Value, SelectError> {
    match (a.length(), b.length()) {
        (None, None) => fallback.ok_or(SelectError::NoLength),
        (Some(_), None) => Ok(a.clone()),
        (None, Some(_)) => Ok(b.clone()),
        (Some(len_a), Some(len_b)) => Ok(if len_b > len_a { b.clone() } else { a.clone() }),
    }
}

/// Returns the longest element of a list; first occurrence wins ties.
///
/// Errors on a non-list argument, on an empty list, and on any element
/// without a length concept. An all-empty list of candidates is valid —
/// zero is an ordinary length — and yields the first element.
pub fn longest_of(candidates: &Value) -> Result<&Value, SelectError> {
    let Value::List(items) = candidates else {
        return Err(SelectError::NotASequence);
    };
    if items.is_empty() {
        return Err(SelectError::EmptyList);
    }

    let mut best_index = 0;
    let mut best_length = 0;
    for (index, item) in items.iter().enumerate() {
        let length = item.length().ok_or(SelectError::NoLength)?;
        if length > best_length {
            best_index = index;
            best_length = length;
        }
    }

    Ok(&items[best_index])
}
