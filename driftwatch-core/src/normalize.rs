//! Canonicalization of state trees, so that semantically equivalent inputs
//! compare equal.
//!
//! Sources of state rarely agree on representation: one API returns `"80"`
//! where another returns `80`, a config file says `"Enabled"` where the provider
//! reports `"enabled"`, and security group lists come back in whatever order the
//! backend stored them. Normalization folds these differences away:
//!
//! - mappings are normalized recursively (keys stay as they are),
//! - sequences are normalized element-wise and then sorted by each element's
//!   textual representation,
//! - strings that parse as numbers become numbers, all other strings are
//!   lowercased and trimmed,
//! - null, booleans and numbers are left alone.
//!
//! ## Sequence ordering
//!
//! Sorting treats every sequence as a set. That is right for lists like
//! security group ids, and wrong for sequences whose order carries meaning
//! (firewall rule priority, command arguments). Such sequences compare equal
//! after normalization even when their order changed. Use the raw comparison
//! in [`crate::engine`] when order matters.

use tracing::trace;

use crate::value::{Number, StateTree, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Normalizer
    }

    /// Produce a normalized copy of `tree`. The input is not modified.
    pub fn normalize(&self, tree: &StateTree) -> StateTree {
        tree.iter()
            .map(|(key, value)| (key.clone(), self.normalize_value(value)))
            .collect()
    }

    pub fn normalize_value(&self, value: &Value) -> Value {
        match value {
            Value::Null => Value::Null,
            // Never coerced: booleans are not numeric strings
            Value::Bool(b) => Value::Bool(*b),
            Value::Number(n) => Value::Number(*n),
            Value::String(s) => normalize_string(s),
            Value::Sequence(items) => {
                let mut items: Vec<Value> =
                    items.iter().map(|item| self.normalize_value(item)).collect();
                // stable, so elements with the same text keep their relative order
                items.sort_by_cached_key(|item| item.to_string());
                Value::Sequence(items)
            }
            Value::Mapping(map) => Value::Mapping(self.normalize(map)),
        }
    }
}

fn normalize_string(s: &str) -> Value {
    match coerce_number(s) {
        Some(n) => {
            trace!(input = s, "coerced numeric string");
            Value::Number(n)
        }
        None => Value::String(s.to_lowercase().trim().to_owned()),
    }
}

/// Parse `s` as a number: as a float when it contains a `.`, otherwise as an
/// integer. Surrounding whitespace is ignored.
///
/// Integers outside the `i64` range and non-finite floats are not coerced.
fn coerce_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if s.contains('.') {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Number::Float)
    } else {
        s.parse::<i64>().ok().map(Number::Int)
    }
}
