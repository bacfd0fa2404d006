//! Attribute tree types.
//!
//! All collections are `BTreeMap`/`BTreeSet` so iteration order, and hence
//! serialization and diff output, is deterministic.

use crate::errors::{Result, StateError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stateboard_core_types::REDACTED;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Whether a resource is managed by the tool or read from a data source
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMode {
    #[default]
    Managed,
    Data,
}

impl ResourceMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "managed" => Some(ResourceMode::Managed),
            "data" => Some(ResourceMode::Data),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceMode::Managed => "managed",
            ResourceMode::Data => "data",
        }
    }
}

/// Instance key of a resource created with `count` or `for_each`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceIndex {
    Int(i64),
    Key(String),
}

impl fmt::Display for ResourceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceIndex::Int(i) => write!(f, "{}", i),
            ResourceIndex::Key(k) => write!(f, "\"{}\"", k),
        }
    }
}

/// Canonical resource identifier: `(module_path, mode, type, name, index)`
///
/// `module` is rendered `module.a.module.b` and is empty for the root
/// module. Field order is the ordering used for diff output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub module: String,
    pub mode: ResourceMode,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<ResourceIndex>,
}

impl ResourceId {
    /// Managed resource in the root module
    pub fn managed(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: String::new(),
            mode: ResourceMode::Managed,
            resource_type: resource_type.into(),
            name: name.into(),
            index: None,
        }
    }

    /// Data source in the root module
    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Data,
            ..Self::managed(resource_type, name)
        }
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_index(mut self, index: ResourceIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Address as written in plans: `module.net.data.aws_ami.ubuntu[0]`
    pub fn address(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.module.is_empty() {
            write!(f, "{}.", self.module)?;
        }
        if self.mode == ResourceMode::Data {
            write!(f, "data.")?;
        }
        write!(f, "{}.{}", self.resource_type, self.name)?;
        if let Some(index) = &self.index {
            write!(f, "[{}]", index)?;
        }
        Ok(())
    }
}

/// Flattened attribute path in dot/index notation (`ingress.0.from_port`)
///
/// Ordered as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributePath(String);

impl AttributePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, segment: &str) -> Self {
        if self.0.is_empty() {
            Self(segment.to_string())
        } else {
            Self(format!("{}.{}", self.0, segment))
        }
    }

    /// True if `self` equals `prefix` or lies underneath it
    pub fn is_within(&self, prefix: &AttributePath) -> bool {
        if prefix.is_root() || self.0 == prefix.0 {
            return true;
        }
        self.0.len() > prefix.0.len()
            && self.0.starts_with(&prefix.0)
            && self.0.as_bytes()[prefix.0.len()] == b'.'
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttributePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Attribute value: scalar, ordered list, or keyed map
///
/// Inside an [`AttributeTree`] only scalars and *empty* containers appear;
/// non-empty containers are flattened into child paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => AttributeValue::Number(n.clone()),
            Value::String(s) => AttributeValue::String(s.clone()),
            Value::Array(items) => {
                AttributeValue::List(items.iter().map(AttributeValue::from_json).collect())
            }
            Value::Object(map) => AttributeValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Number(n) => Value::Number(n.clone()),
            AttributeValue::String(s) => Value::String(s.clone()),
            AttributeValue::List(items) => {
                Value::Array(items.iter().map(AttributeValue::to_json).collect())
            }
            AttributeValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Scalars and empty containers are leaves
    pub fn is_leaf(&self) -> bool {
        match self {
            AttributeValue::List(items) => items.is_empty(),
            AttributeValue::Map(map) => map.is_empty(),
            _ => true,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Number(n.into())
    }
}

/// Flattened attributes of one resource instance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceState {
    attributes: BTreeMap<AttributePath, AttributeValue>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    sensitive_paths: BTreeSet<AttributePath>,
}

impl ResourceState {
    pub(crate) fn new(
        attributes: BTreeMap<AttributePath, AttributeValue>,
        sensitive_paths: BTreeSet<AttributePath>,
    ) -> Self {
        Self {
            attributes,
            sensitive_paths,
        }
    }

    pub fn attributes(&self) -> &BTreeMap<AttributePath, AttributeValue> {
        &self.attributes
    }

    pub fn get(&self, path: &AttributePath) -> Option<&AttributeValue> {
        self.attributes.get(path)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Paths the state file marked sensitive (prefixes)
    pub fn sensitive_paths(&self) -> &BTreeSet<AttributePath> {
        &self.sensitive_paths
    }

    pub fn is_sensitive(&self, path: &AttributePath) -> bool {
        self.sensitive_paths.iter().any(|p| path.is_within(p))
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct ResourceEntry {
    id: ResourceId,
    attributes: BTreeMap<AttributePath, AttributeValue>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    sensitive_paths: BTreeSet<AttributePath>,
}

/// Normalized snapshot: resource id → flattened attributes
///
/// Immutable once built. Serialized as an ordered list of resources.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "Vec<ResourceEntry>", from = "Vec<ResourceEntry>")]
pub struct AttributeTree {
    resources: BTreeMap<ResourceId, ResourceState>,
}

impl From<AttributeTree> for Vec<ResourceEntry> {
    fn from(tree: AttributeTree) -> Self {
        tree.resources
            .into_iter()
            .map(|(id, state)| ResourceEntry {
                id,
                attributes: state.attributes,
                sensitive_paths: state.sensitive_paths,
            })
            .collect()
    }
}

impl From<Vec<ResourceEntry>> for AttributeTree {
    fn from(entries: Vec<ResourceEntry>) -> Self {
        Self {
            resources: entries
                .into_iter()
                .map(|e| (e.id, ResourceState::new(e.attributes, e.sensitive_paths)))
                .collect(),
        }
    }
}

impl AttributeTree {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a tree from resources with nested JSON attribute objects
    ///
    /// # Errors
    ///
    /// `MalformedSnapshot` if a resource id repeats, an attribute value is
    /// not an object, or two nested keys flatten to the same path.
    pub fn from_nested<I>(resources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ResourceId, Value)>,
    {
        let mut tree = Self::empty();
        for (id, attributes) in resources {
            let flat = flatten_attributes(&id, &attributes)?;
            tree.insert(id, ResourceState::new(flat, BTreeSet::new()))?;
        }
        Ok(tree)
    }

    pub(crate) fn insert(&mut self, id: ResourceId, state: ResourceState) -> Result<()> {
        if self.resources.contains_key(&id) {
            return Err(StateError::malformed(format!(
                "resource {} appears more than once",
                id
            )));
        }
        self.resources.insert(id, state);
        Ok(())
    }

    pub fn resources(&self) -> impl Iterator<Item = (&ResourceId, &ResourceState)> {
        self.resources.iter()
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&ResourceState> {
        self.resources.get(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.contains_key(id)
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.resources.keys()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.resources.values().map(ResourceState::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Copy with every value under a sensitive path replaced by the
    /// redaction placeholder; used before a tree leaves the engine
    pub fn redacted(&self) -> AttributeTree {
        let resources = self
            .resources
            .iter()
            .map(|(id, state)| {
                let attributes = state
                    .attributes
                    .iter()
                    .map(|(path, value)| {
                        let shown = if state.is_sensitive(path) {
                            AttributeValue::from(REDACTED)
                        } else {
                            value.clone()
                        };
                        (path.clone(), shown)
                    })
                    .collect();
                let state = ResourceState::new(attributes, state.sensitive_paths.clone());
                (id.clone(), state)
            })
            .collect();
        AttributeTree { resources }
    }

    /// SHA-256 of the canonical serialization of this tree
    ///
    /// # Errors
    ///
    /// `Serialization` if the tree cannot be serialized.
    pub fn digest(&self) -> Result<String> {
        crate::digest::tree_digest(self)
    }

    /// Check the flattened-leaf invariant
    ///
    /// Trees produced by the builder always pass. Trees deserialized from an
    /// external source may not.
    ///
    /// # Errors
    ///
    /// `IncomparableSnapshot` naming the first offending resource/path.
    pub fn validate(&self) -> Result<()> {
        for (id, state) in &self.resources {
            for (path, value) in &state.attributes {
                if path.is_root() {
                    return Err(StateError::IncomparableSnapshot {
                        reason: format!("resource {} has an attribute with an empty path", id),
                    });
                }
                if !value.is_leaf() {
                    return Err(StateError::IncomparableSnapshot {
                        reason: format!(
                            "resource {} attribute {} holds a non-flattened value",
                            id, path
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Flatten a resource's nested attribute object into path → leaf
pub(crate) fn flatten_attributes(
    id: &ResourceId,
    attributes: &Value,
) -> Result<BTreeMap<AttributePath, AttributeValue>> {
    let obj = attributes.as_object().ok_or_else(|| {
        StateError::malformed(format!("attributes of {} must be an object", id))
    })?;
    let mut out = BTreeMap::new();
    for (key, value) in obj {
        flatten_into(id, AttributePath::root().child(key), value, &mut out)?;
    }
    Ok(out)
}

fn flatten_into(
    id: &ResourceId,
    path: AttributePath,
    value: &Value,
    out: &mut BTreeMap<AttributePath, AttributeValue>,
) -> Result<()> {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(id, path.child(key), child, out)?;
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(id, path.child(&i.to_string()), child, out)?;
            }
        }
        leaf => {
            if out.contains_key(&path) {
                return Err(StateError::malformed(format!(
                    "resource {} has ambiguous attribute path {}",
                    id, path
                )));
            }
            out.insert(path, AttributeValue::from_json(leaf));
        }
    }
    Ok(())
}
