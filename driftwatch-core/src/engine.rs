//! Raw drift detection: strict, uncoerced comparison of desired and actual
//! state, classified per field.
//!
//! Unlike [`crate::compare`], nothing is normalized here. `80` and `"80"`
//! differ, `["a", "b"]` and `["b", "a"]` differ. Numbers compare by value, so
//! `3` and `3.0` are the same.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info};

use crate::state::StateDocument;
use crate::value::{StateTree, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftKind {
    /// The field exists in the actual state but not in the desired state.
    Added,
    /// The field is desired but missing from the actual state.
    Removed,
    /// The field exists on both sides with different values.
    Modified,
}

impl DriftKind {
    fn classify(in_desired: bool, in_actual: bool) -> DriftKind {
        if in_desired && in_actual {
            DriftKind::Modified
        } else if !in_desired {
            DriftKind::Added
        } else {
            DriftKind::Removed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriftKind::Added => "added",
            DriftKind::Removed => "removed",
            DriftKind::Modified => "modified",
        }
    }
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a [`DriftRecord`] is about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DriftTarget {
    /// A field of the resource's state tree.
    #[default]
    Property,
    /// The type of the resource itself. The record's field is `type`, which a
    /// property of the same name does not collide with.
    ResourceType,
}

impl DriftTarget {
    pub fn is_property(&self) -> bool {
        matches!(self, DriftTarget::Property)
    }
}

/// A single drifted field. A side on which the field is absent holds
/// [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftRecord {
    pub resource: String,
    pub field: String,
    pub desired: Value,
    pub actual: Value,
    #[serde(rename = "type")]
    pub kind: DriftKind,
    #[serde(default, skip_serializing_if = "DriftTarget::is_property")]
    pub target: DriftTarget,
}

/// Strict difference test.
///
/// `None` and `Some(Value::Null)` both mean "no value", and two of those never
/// differ. Otherwise values differ unless they are structurally equal with
/// matching types, in order for sequences.
pub fn values_differ(desired: Option<&Value>, actual: Option<&Value>) -> bool {
    let desired = desired.filter(|v| !v.is_null());
    let actual = actual.filter(|v| !v.is_null());
    match (desired, actual) {
        (None, None) => false,
        (None, Some(_)) | (Some(_), None) => true,
        (Some(d), Some(a)) => d != a,
    }
}

/// Compare `desired` against `actual` and return one record per differing
/// field, in key order.
///
/// This does not accumulate anything; see [`DriftEngine`] for that.
pub fn detect_drift(desired: &StateTree, actual: &StateTree, resource_id: &str) -> Vec<DriftRecord> {
    let keys: BTreeSet<&String> = desired.keys().chain(actual.keys()).collect();

    keys.into_iter()
        .filter_map(|key| {
            let d = desired.get(key);
            let a = actual.get(key);
            if !values_differ(d, a) {
                return None;
            }
            let kind = DriftKind::classify(d.is_some(), a.is_some());
            debug!(resource = resource_id, field = %key, %kind, "drift");
            Some(DriftRecord {
                resource: resource_id.to_owned(),
                field: key.clone(),
                desired: d.cloned().unwrap_or(Value::Null),
                actual: a.cloned().unwrap_or(Value::Null),
                kind,
                target: DriftTarget::Property,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    pub modified: usize,
    pub added: usize,
    pub removed: usize,
}

impl KindCounts {
    pub fn get(&self, kind: DriftKind) -> usize {
        match kind {
            DriftKind::Added => self.added,
            DriftKind::Removed => self.removed,
            DriftKind::Modified => self.modified,
        }
    }

    fn increment(&mut self, kind: DriftKind) {
        match kind {
            DriftKind::Added => self.added += 1,
            DriftKind::Removed => self.removed += 1,
            DriftKind::Modified => self.modified += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftSummary {
    pub total_drifts: usize,
    /// Distinct resource ids among the records. The empty id counts as one.
    pub resources_affected: usize,
    pub by_type: KindCounts,
}

impl DriftSummary {
    pub fn of(records: &[DriftRecord]) -> DriftSummary {
        let mut by_type = KindCounts::default();
        let mut resources = HashSet::new();
        for r in records {
            by_type.increment(r.kind);
            resources.insert(r.resource.as_str());
        }
        DriftSummary {
            total_drifts: records.len(),
            resources_affected: resources.len(),
            by_type,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.total_drifts == 0
    }
}

/// Runs raw drift detection and keeps every record it produced, until
/// [`DriftEngine::clear`] is called.
///
/// The accumulator is plain instance state. Mutation goes through `&mut self`,
/// so sharing one engine between threads requires wrapping it in a mutex.
#[derive(Debug, Default)]
pub struct DriftEngine {
    records: Vec<DriftRecord>,
}

impl DriftEngine {
    pub fn new() -> Self {
        DriftEngine {
            records: Vec::new(),
        }
    }

    /// Like [`detect_drift`], and also appends the result to the accumulator.
    pub fn detect_drift(
        &mut self,
        desired: &StateTree,
        actual: &StateTree,
        resource_id: &str,
    ) -> Vec<DriftRecord> {
        let drifts = detect_drift(desired, actual, resource_id);
        self.records.extend(drifts.iter().cloned());
        drifts
    }

    /// Detect drift for every resource in either document.
    ///
    /// A resource present on one side only is compared against an empty tree,
    /// so all its (non-null) properties show up as `removed` or `added`. A
    /// changed resource type is reported as a `modified` record for the field
    /// `type` with target [`DriftTarget::ResourceType`], ahead of the property
    /// records.
    ///
    /// Fails without recording anything if either document has ambiguous
    /// resource ids.
    pub fn detect_deployment(
        &mut self,
        desired: &StateDocument,
        actual: &StateDocument,
    ) -> Result<Vec<DriftRecord>> {
        let desired_resources = desired.resources()?;
        let actual_resources = actual.resources()?;
        let ids: BTreeSet<&String> = desired_resources
            .keys()
            .chain(actual_resources.keys())
            .collect();
        let empty = StateTree::new();
        let resource_count = ids.len();

        let mut drifts = Vec::new();
        for id in ids {
            let _span = debug_span!("resource", id = %id).entered();
            let d = desired_resources.get(id);
            let a = actual_resources.get(id);
            if let (Some(d), Some(a)) = (d, a) {
                if d.type_ != a.type_ {
                    debug!(desired = %d.type_, actual = %a.type_, "resource type changed");
                    drifts.push(DriftRecord {
                        resource: id.clone(),
                        field: "type".to_owned(),
                        desired: Value::String(d.type_.clone()),
                        actual: Value::String(a.type_.clone()),
                        kind: DriftKind::Modified,
                        target: DriftTarget::ResourceType,
                    });
                }
            }
            drifts.extend(detect_drift(
                d.map_or(&empty, |r| &r.properties),
                a.map_or(&empty, |r| &r.properties),
                id,
            ));
        }

        info!(
            drifts = drifts.len(),
            resources = resource_count,
            "compared deployment"
        );
        self.records.extend(drifts.iter().cloned());
        Ok(drifts)
    }

    /// All records accumulated since construction or the last [`clear`](Self::clear).
    pub fn records(&self) -> &[DriftRecord] {
        &self.records
    }

    pub fn summary(&self) -> DriftSummary {
        DriftSummary::of(&self.records)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn into_records(self) -> Vec<DriftRecord> {
        self.records
    }
}
