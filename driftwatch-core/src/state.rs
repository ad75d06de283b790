//! State documents: the desired or actual configuration of a whole
//! deployment, as opposed to the single-resource [`StateTree`].
//!
//! ```json
//! {
//!   "_type": "driftState",
//!   "resources": {
//!     "web": { "type": "server", "properties": { "size": "small" } }
//!   },
//!   "deployments": {
//!     "prod": { "resources": { ... }, "deployments": { ... } }
//!   }
//! }
//! ```
//!
//! Resources in nested deployments are addressed by joining the deployment
//! names and the resource name with `.`, e.g. `prod.db`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::value::{tree_from_json, StateTree};

const STATE_TYPE: &str = "driftState";

/// The root of a state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(flatten)]
    deployment: DeploymentState,

    #[serde(rename = "_type", deserialize_with = "type_is_drift_state")]
    type_: String,
}

fn type_is_drift_state<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == STATE_TYPE {
        Ok(s)
    } else {
        Err(serde::de::Error::custom(format!(
            "unexpected _type in state document: expected '{}', got '{}'",
            STATE_TYPE, s
        )))
    }
}

/// The state of a set of resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
    /// State of resources in nested deployments
    #[serde(default)]
    pub deployments: BTreeMap<String, DeploymentState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// The type of the resource
    #[serde(rename = "type")]
    pub type_: String,
    /// The properties of the resource. `null` is the same as no properties.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: StateTree,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<StateTree, D::Error>
where
    D: Deserializer<'de>,
{
    let tree: Option<StateTree> = Deserialize::deserialize(deserializer)?;
    Ok(tree.unwrap_or_default())
}

impl StateDocument {
    pub fn new(deployment: DeploymentState) -> Self {
        StateDocument {
            deployment,
            type_: STATE_TYPE.to_owned(),
        }
    }

    pub fn deployment(&self) -> &DeploymentState {
        &self.deployment
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<StateDocument> {
        serde_json::from_reader(reader).context("parsing state document")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<StateDocument> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("opening state document {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("reading state document {}", path.display()))
    }

    /// All resources, including those of nested deployments, by id.
    ///
    /// Fails when two resources end up with the same id, e.g. a top-level
    /// resource named `prod.db` next to resource `db` in deployment `prod`.
    pub fn resources(&self) -> Result<BTreeMap<String, &ResourceState>> {
        let mut out = BTreeMap::new();
        collect_resources(None, &self.deployment, &mut out)?;
        Ok(out)
    }
}

fn collect_resources<'a>(
    prefix: Option<&str>,
    deployment: &'a DeploymentState,
    out: &mut BTreeMap<String, &'a ResourceState>,
) -> Result<()> {
    let qualify = |name: &str| match prefix {
        Some(p) => format!("{}.{}", p, name),
        None => name.to_owned(),
    };
    for (name, resource) in &deployment.resources {
        let id = qualify(name);
        if out.contains_key(&id) {
            bail!("resource id {} is ambiguous: it names more than one resource", id);
        }
        out.insert(id, resource);
    }
    for (name, nested) in &deployment.deployments {
        collect_resources(Some(&qualify(name)), nested, out)?;
    }
    Ok(())
}

/// Read a single resource's state tree from a JSON file. A file containing
/// just `null` yields an empty tree.
pub fn load_tree<P: AsRef<Path>>(path: P) -> Result<StateTree> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("opening state file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing state file {}", path.display()))?;
    tree_from_json(value).with_context(|| format!("reading state file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;
    use crate::value::Value;
    use serde_json::json;

    const BASIC_EXAMPLE: &str = r#"
    {
        "_type": "driftState",
        "resources": {
            "web": {
                "type": "server",
                "properties": { "size": "small", "ports": [80, 443] }
            }
        },
        "deployments": {
            "prod": {
                "resources": {
                    "db": { "type": "postgres", "properties": { "version": 15 } }
                },
                "deployments": {
                    "eu": {
                        "resources": { "cache": { "type": "redis" } }
                    }
                }
            }
        }
    }
"#;

    #[test]
    fn test_parse_document() {
        let doc = StateDocument::from_reader(BASIC_EXAMPLE.as_bytes()).unwrap();
        let resources = doc.resources().unwrap();
        let ids: Vec<_> = resources.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["prod.db", "prod.eu.cache", "web"]);
        assert_eq!(resources["web"].type_, "server");
        assert_eq!(
            resources["prod.db"].properties.get("version"),
            Some(&Value::from(15_i64))
        );
        assert!(resources["prod.eu.cache"].properties.is_empty());
    }

    #[test]
    fn test_wrong_type() {
        let input = r#"{"_type": "nixopsState", "resources": {}}"#;
        let err = StateDocument::from_reader(input.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("unexpected _type"), "{:#}", err);
    }

    #[test]
    fn test_missing_type() {
        let input = r#"{"resources": {}}"#;
        assert!(StateDocument::from_reader(input.as_bytes()).is_err());
    }

    #[test]
    fn test_resource_without_type() {
        let input = r#"{"_type": "driftState", "resources": {"a": {"properties": {}}}}"#;
        assert!(StateDocument::from_reader(input.as_bytes()).is_err());
    }

    #[test]
    fn test_null_properties() {
        let input = r#"{"_type": "driftState", "resources": {"a": {"type": "t", "properties": null}}}"#;
        let doc = StateDocument::from_reader(input.as_bytes()).unwrap();
        assert!(doc.resources().unwrap()["a"].properties.is_empty());
    }

    #[test]
    fn test_clashing_ids() {
        let doc: StateDocument = serde_json::from_value(json!({
            "_type": "driftState",
            "resources": {"prod.db": {"type": "pg", "properties": {"v": 1}}},
            "deployments": {
                "prod": {"resources": {"db": {"type": "pg", "properties": {"v": 1}}}}
            }
        }))
        .unwrap();
        let err = doc.resources().unwrap_err();
        assert!(err.to_string().contains("prod.db"), "{}", err);
    }

    #[test]
    fn test_invalid_json() {
        let input = r#"{"_type": "driftState", "resources": {"#;
        assert!(StateDocument::from_reader(input.as_bytes()).is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let doc = StateDocument::from_reader(BASIC_EXAMPLE.as_bytes()).unwrap();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["_type"], json!("driftState"));
        let again: StateDocument = serde_json::from_value(value).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_new_document() {
        let doc = StateDocument::new(DeploymentState::default());
        assert!(doc.resources().unwrap().is_empty());
        assert!(doc.deployment().deployments.is_empty());
    }

    #[test]
    fn test_load_files() {
        let dir = tempfile::tempdir().unwrap();

        let doc_path = dir.path().join("state.json");
        File::create(&doc_path)
            .unwrap()
            .write_all(BASIC_EXAMPLE.as_bytes())
            .unwrap();
        assert_eq!(StateDocument::load(&doc_path).unwrap().resources().unwrap().len(), 3);

        let tree_path = dir.path().join("tree.json");
        std::fs::write(&tree_path, r#"{"port": "80"}"#).unwrap();
        assert_eq!(
            load_tree(&tree_path).unwrap().get("port"),
            Some(&Value::from("80"))
        );

        let null_path = dir.path().join("null.json");
        std::fs::write(&null_path, "null").unwrap();
        assert!(load_tree(&null_path).unwrap().is_empty());

        let list_path = dir.path().join("list.json");
        std::fs::write(&list_path, "[1]").unwrap();
        assert!(load_tree(&list_path).is_err());

        let missing = dir.path().join("missing.json");
        let err = load_tree(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.json"), "{}", err);
    }
}
