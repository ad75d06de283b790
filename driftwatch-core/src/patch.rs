//! Drift expressed as an RFC 6902 JSON Patch.
//!
//! A patch describes how the actual state departs from the desired state:
//! applied to the desired JSON, it yields the actual JSON. It is a report
//! format for downstream tooling; nothing here applies it anywhere.

use std::collections::BTreeSet;

use json_patch::{
    jsonptr::PointerBuf, AddOperation, Patch, PatchOperation, RemoveOperation, ReplaceOperation,
};
use serde_json::json;

use crate::engine::{detect_drift, DriftKind, DriftRecord};
use crate::state::{DeploymentState, ResourceState, StateDocument};
use crate::value::tree_to_json;

fn operation(path: PointerBuf, record: &DriftRecord) -> PatchOperation {
    match record.kind {
        DriftKind::Added => PatchOperation::Add(AddOperation {
            path,
            value: record.actual.to_json(),
        }),
        DriftKind::Removed => PatchOperation::Remove(RemoveOperation { path }),
        DriftKind::Modified => PatchOperation::Replace(ReplaceOperation {
            path,
            value: record.actual.to_json(),
        }),
    }
}

/// Patch for the records of a single state tree, addressing `/<field>`.
///
/// The resource id of the records is not part of the path. Use
/// [`deployment_patch`] for whole state documents.
pub fn to_patch(records: &[DriftRecord]) -> Patch {
    Patch(
        records
            .iter()
            .map(|r| operation(PointerBuf::from_tokens([r.field.as_str()]), r))
            .collect(),
    )
}

/// Patch from one state document to another, with paths into the serialized
/// document: `/resources/<name>/properties/<field>`, `/resources/<name>/type`
/// and `/deployments/<name>/...` for nested deployments.
///
/// Resources and deployments that exist on one side only are added or removed
/// as a whole.
pub fn deployment_patch(desired: &StateDocument, actual: &StateDocument) -> Patch {
    let mut ops = Vec::new();
    diff_deployment(&[], desired.deployment(), actual.deployment(), &mut ops);
    Patch(ops)
}

fn path(prefix: &[&str], tail: &[&str]) -> PointerBuf {
    PointerBuf::from_tokens(prefix.iter().chain(tail).copied())
}

fn resource_to_json(resource: &ResourceState) -> serde_json::Value {
    json!({
        "type": resource.type_,
        "properties": tree_to_json(&resource.properties),
    })
}

fn deployment_to_json(deployment: &DeploymentState) -> serde_json::Value {
    let resources: serde_json::Map<String, serde_json::Value> = deployment
        .resources
        .iter()
        .map(|(name, r)| (name.clone(), resource_to_json(r)))
        .collect();
    let deployments: serde_json::Map<String, serde_json::Value> = deployment
        .deployments
        .iter()
        .map(|(name, d)| (name.clone(), deployment_to_json(d)))
        .collect();
    json!({
        "resources": resources,
        "deployments": deployments,
    })
}

fn diff_deployment(
    prefix: &[&str],
    desired: &DeploymentState,
    actual: &DeploymentState,
    ops: &mut Vec<PatchOperation>,
) {
    let names: BTreeSet<&String> = desired
        .resources
        .keys()
        .chain(actual.resources.keys())
        .collect();
    for name in names {
        match (desired.resources.get(name), actual.resources.get(name)) {
            (Some(_), None) => ops.push(PatchOperation::Remove(RemoveOperation {
                path: path(prefix, &["resources", name.as_str()]),
            })),
            (None, Some(a)) => ops.push(PatchOperation::Add(AddOperation {
                path: path(prefix, &["resources", name.as_str()]),
                value: resource_to_json(a),
            })),
            (Some(d), Some(a)) => {
                if d.type_ != a.type_ {
                    ops.push(PatchOperation::Replace(ReplaceOperation {
                        path: path(prefix, &["resources", name.as_str(), "type"]),
                        value: json!(a.type_),
                    }));
                }
                for r in detect_drift(&d.properties, &a.properties, name) {
                    let field = ["resources", name.as_str(), "properties", r.field.as_str()];
                    ops.push(operation(path(prefix, &field), &r));
                }
            }
            (None, None) => {}
        }
    }

    let names: BTreeSet<&String> = desired
        .deployments
        .keys()
        .chain(actual.deployments.keys())
        .collect();
    for name in names {
        match (desired.deployments.get(name), actual.deployments.get(name)) {
            (Some(_), None) => ops.push(PatchOperation::Remove(RemoveOperation {
                path: path(prefix, &["deployments", name.as_str()]),
            })),
            (None, Some(a)) => ops.push(PatchOperation::Add(AddOperation {
                path: path(prefix, &["deployments", name.as_str()]),
                value: deployment_to_json(a),
            })),
            (Some(d), Some(a)) => {
                let nested: Vec<&str> = prefix
                    .iter()
                    .copied()
                    .chain(["deployments", name.as_str()])
                    .collect();
                diff_deployment(&nested, d, a, ops);
            }
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{tree_from_json, StateTree};

    fn tree(v: serde_json::Value) -> StateTree {
        tree_from_json(v).unwrap()
    }

    fn document(v: serde_json::Value) -> StateDocument {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_patch_turns_desired_into_actual() {
        let desired = tree(json!({"a": 1, "b": 2, "c": "x", "d": {"e": [1, 2]}}));
        let actual = tree(json!({"a": 1, "c": "y", "d": {"e": [2, 1]}, "f": [true]}));
        let records = detect_drift(&desired, &actual, "");
        let patch = to_patch(&records);

        let mut doc = tree_to_json(&desired);
        json_patch::patch(&mut doc, &patch.0).unwrap();
        assert_eq!(doc, tree_to_json(&actual));
    }

    #[test]
    fn test_operations() {
        let records = detect_drift(
            &tree(json!({"gone": 1, "mod": 1})),
            &tree(json!({"new": 2, "mod": 3})),
            "",
        );
        let value = serde_json::to_value(to_patch(&records)).unwrap();
        assert_eq!(
            value,
            json!([
                {"op": "remove", "path": "/gone"},
                {"op": "replace", "path": "/mod", "value": 3},
                {"op": "add", "path": "/new", "value": 2}
            ])
        );
    }

    #[test]
    fn test_modified_to_null_keeps_key() {
        let records = detect_drift(&tree(json!({"a": 1})), &tree(json!({"a": null})), "");
        let value = serde_json::to_value(to_patch(&records)).unwrap();
        assert_eq!(value, json!([{"op": "replace", "path": "/a", "value": null}]));
    }

    #[test]
    fn test_field_escaped() {
        let records = detect_drift(&tree(json!({})), &tree(json!({"a/b~c": 1})), "prod.web");
        let value = serde_json::to_value(to_patch(&records)).unwrap();
        assert_eq!(value, json!([{"op": "add", "path": "/a~1b~0c", "value": 1}]));
    }

    #[test]
    fn test_empty() {
        assert!(to_patch(&[]).0.is_empty());
    }

    #[test]
    fn test_deployment_patch_applies_to_document() {
        let desired = document(json!({
            "_type": "driftState",
            "resources": {
                "vm": {"type": "server", "properties": {"type": "small", "port": 80}},
                "old": {"type": "bucket", "properties": {"name": "x"}},
                "a/b": {"type": "dns", "properties": {"ttl": 60}}
            },
            "deployments": {
                "prod": {
                    "resources": {"db": {"type": "pg", "properties": {"v": 14}}}
                },
                "legacy": {}
            }
        }));
        let actual = document(json!({
            "_type": "driftState",
            "resources": {
                "vm": {"type": "instance", "properties": {"type": "large", "port": 80}},
                "new": {"type": "queue", "properties": null},
                "a/b": {"type": "dns", "properties": {"ttl": 60, "x~y": true}}
            },
            "deployments": {
                "prod": {
                    "resources": {"db": {"type": "pg", "properties": {"v": 15}}},
                    "deployments": {
                        "eu": {"resources": {"cache": {"type": "redis"}}}
                    }
                }
            }
        }));

        let patch = deployment_patch(&desired, &actual);
        let mut doc = serde_json::to_value(&desired).unwrap();
        json_patch::patch(&mut doc, &patch.0).unwrap();
        assert_eq!(doc, serde_json::to_value(&actual).unwrap());

        let paths: Vec<String> = serde_json::to_value(&patch)
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|op| op["path"].as_str().unwrap().to_owned())
            .collect();
        assert!(paths.contains(&"/resources/vm/type".to_owned()));
        assert!(paths.contains(&"/resources/vm/properties/type".to_owned()));
        assert!(paths.contains(&"/resources/a~1b/properties/x~0y".to_owned()));
        assert!(paths.contains(&"/deployments/prod/resources/db/properties/v".to_owned()));
        assert!(paths.contains(&"/deployments/prod/deployments/eu".to_owned()));
        assert!(paths.contains(&"/deployments/legacy".to_owned()));
    }

    #[test]
    fn test_deployment_patch_identical() {
        let doc = document(json!({
            "_type": "driftState",
            "resources": {"vm": {"type": "server", "properties": {"port": 80}}}
        }));
        assert!(deployment_patch(&doc, &doc).0.is_empty());
    }
}
