//! Normalized comparison: both sides go through the [`Normalizer`] first, then
//! fields are compared with plain equality.
//!
//! This is deliberately a separate path from [`crate::engine`]. It does not
//! classify differences and does not accumulate them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::normalize::Normalizer;
use crate::value::{StateTree, Value};

/// A field whose normalized values differ. Values are the normalized ones; an
/// absent field is [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDifference {
    pub field: String,
    pub desired: Value,
    pub actual: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Comparator {
    normalizer: Normalizer,
}

impl Comparator {
    pub fn new() -> Self {
        Comparator {
            normalizer: Normalizer::new(),
        }
    }

    pub fn normalize(&self, tree: &StateTree) -> StateTree {
        self.normalizer.normalize(tree)
    }

    /// Normalize both trees and list the fields that still differ, sorted by
    /// field name.
    pub fn compare(&self, desired: &StateTree, actual: &StateTree) -> Vec<FieldDifference> {
        let desired = self.normalize(desired);
        let actual = self.normalize(actual);
        let keys: BTreeSet<&String> = desired.keys().chain(actual.keys()).collect();

        let mut differences = Vec::new();
        for key in keys {
            let d = desired.get(key).cloned().unwrap_or(Value::Null);
            let a = actual.get(key).cloned().unwrap_or(Value::Null);
            if d != a {
                debug!(field = %key, "normalized values differ");
                differences.push(FieldDifference {
                    field: key.clone(),
                    desired: d,
                    actual: a,
                });
            }
        }
        differences
    }
}
