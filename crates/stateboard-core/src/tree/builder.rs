//! Snapshot parsing
//!
//! Accepts the v4 layout (`resources[].instances[]`) and the legacy v3
//! layout (`modules[].resources{}` with pre-flattened string attributes).
//! Both produce the same canonical [`ResourceId`]s.

use super::model::{
    flatten_attributes, AttributePath, AttributeTree, AttributeValue, ResourceId, ResourceIndex,
    ResourceMode, ResourceState,
};
use crate::digest;
use crate::errors::{Result, StateError};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// A parsed snapshot: header fields plus the normalized tree
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSnapshot {
    pub format_version: u64,
    pub lineage: Option<String>,
    pub serial: Option<u64>,
    pub tool_version: Option<String>,
    /// SHA-256 of the canonical JSON of the raw payload
    pub content_hash: String,
    pub tree: AttributeTree,
}

/// Parse a raw snapshot into an attribute tree
///
/// # Errors
///
/// `MalformedSnapshot` if the payload is not valid JSON or cannot be
/// normalized into modules/resources/attributes.
pub fn build_tree(bytes: &[u8]) -> Result<AttributeTree> {
    Ok(parse_snapshot(bytes)?.tree)
}

/// Parse a raw snapshot, keeping its header fields and content hash
///
/// # Errors
///
/// `MalformedSnapshot` as for [`build_tree`], and also when `lineage`,
/// `serial` or `terraform_version` are present with the wrong type.
pub fn parse_snapshot(bytes: &[u8]) -> Result<ParsedSnapshot> {
    let raw: Value = serde_json::from_slice(bytes)
        .map_err(|e| StateError::malformed(format!("invalid JSON: {}", e)))?;
    let obj = raw
        .as_object()
        .ok_or_else(|| StateError::malformed("snapshot must be a JSON object"))?;

    let format_version = match obj.get("version") {
        Some(v) => v
            .as_u64()
            .ok_or_else(|| StateError::malformed("`version` must be a non-negative integer"))?,
        None if obj.contains_key("resources") => 4,
        None if obj.contains_key("modules") => 3,
        None => return Err(StateError::malformed("missing `version`")),
    };

    let tree = match format_version {
        0..=2 => {
            return Err(StateError::malformed(format!(
                "unsupported state format version {}",
                format_version
            )))
        }
        3 => build_v3(obj)?,
        _ => build_v4(obj)?,
    };

    Ok(ParsedSnapshot {
        format_version,
        lineage: optional_str(obj, "lineage")?,
        serial: match obj.get("serial") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                v.as_u64()
                    .ok_or_else(|| StateError::malformed("`serial` must be a non-negative integer"))?,
            ),
        },
        tool_version: optional_str(obj, "terraform_version")?,
        content_hash: digest::content_hash(&raw),
        tree,
    })
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(StateError::malformed(format!("`{}` must be a string", key))),
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, key: &str, what: &str) -> Result<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| StateError::malformed(format!("{} is missing string field `{}`", what, key)))
}

// --- v4 ---------------------------------------------------------------------

fn build_v4(obj: &Map<String, Value>) -> Result<AttributeTree> {
    let resources = obj
        .get("resources")
        .and_then(Value::as_array)
        .ok_or_else(|| StateError::malformed("`resources` must be an array"))?;

    let mut tree = AttributeTree::empty();
    for (i, resource) in resources.iter().enumerate() {
        let what = format!("resources[{}]", i);
        let resource = resource
            .as_object()
            .ok_or_else(|| StateError::malformed(format!("{} must be an object", what)))?;

        let mode = match resource.get("mode").and_then(Value::as_str) {
            None => ResourceMode::Managed,
            Some(m) => ResourceMode::parse(m).ok_or_else(|| {
                StateError::malformed(format!("{} has unknown mode `{}`", what, m))
            })?,
        };
        let resource_type = required_str(resource, "type", &what)?;
        let name = required_str(resource, "name", &what)?;
        let module = resource
            .get("module")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let instances = resource
            .get("instances")
            .and_then(Value::as_array)
            .ok_or_else(|| StateError::malformed(format!("{} is missing `instances`", what)))?;

        for instance in instances {
            let instance = instance.as_object().ok_or_else(|| {
                StateError::malformed(format!("{} has a non-object instance", what))
            })?;
            // Deposed objects are pending destruction, not current state.
            if instance.contains_key("deposed") {
                continue;
            }

            let mut id = ResourceId::managed(resource_type, name).in_module(module);
            id.mode = mode;
            if let Some(index) = parse_index_key(instance.get("index_key"), &what)? {
                id = id.with_index(index);
            }

            let attributes = instance_attributes(&id, instance)?;
            let sensitive = sensitive_paths(instance.get("sensitive_attributes"));
            tree.insert(id, ResourceState::new(attributes, sensitive))?;
        }
    }
    Ok(tree)
}

fn parse_index_key(value: Option<&Value>, what: &str) -> Result<Option<ResourceIndex>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(ResourceIndex::Key(s.clone()))),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|i| Some(ResourceIndex::Int(i)))
            .ok_or_else(|| StateError::malformed(format!("{} has a non-integer index_key", what))),
        Some(_) => Err(StateError::malformed(format!(
            "{} has an index_key that is neither string nor integer",
            what
        ))),
    }
}

fn instance_attributes(
    id: &ResourceId,
    instance: &Map<String, Value>,
) -> Result<BTreeMap<AttributePath, AttributeValue>> {
    if let Some(attributes) = instance.get("attributes") {
        return flatten_attributes(id, attributes);
    }
    // States upgraded from v3 may still carry flat string attributes.
    if let Some(flat) = instance.get("attributes_flat") {
        let flat = flat.as_object().ok_or_else(|| {
            StateError::malformed(format!("attributes_flat of {} must be an object", id))
        })?;
        return Ok(from_flat_strings(flat));
    }
    Err(StateError::malformed(format!("{} has no attributes", id)))
}

/// Convert `sensitive_attributes` step lists into attribute path prefixes
///
/// Unknown step shapes are skipped.
fn sensitive_paths(value: Option<&Value>) -> BTreeSet<AttributePath> {
    let mut out = BTreeSet::new();
    let Some(paths) = value.and_then(Value::as_array) else {
        return out;
    };
    'paths: for steps in paths {
        let Some(steps) = steps.as_array() else {
            continue;
        };
        let mut path = AttributePath::root();
        for step in steps {
            let segment = match step.get("type").and_then(Value::as_str) {
                Some("get_attr") => step.get("value").and_then(Value::as_str).map(str::to_string),
                Some("index") => match step.get("value").and_then(|v| v.get("value")) {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                },
                _ => None,
            };
            match segment {
                Some(segment) => path = path.child(&segment),
                None => continue 'paths,
            }
        }
        if !path.is_root() {
            out.insert(path);
        }
    }
    out
}

// --- v3 ---------------------------------------------------------------------

fn build_v3(obj: &Map<String, Value>) -> Result<AttributeTree> {
    let modules = obj
        .get("modules")
        .and_then(Value::as_array)
        .ok_or_else(|| StateError::malformed("`modules` must be an array"))?;

    let mut tree = AttributeTree::empty();
    for (i, module) in modules.iter().enumerate() {
        let module = module
            .as_object()
            .ok_or_else(|| StateError::malformed(format!("modules[{}] must be an object", i)))?;
        let module_path = v3_module_path(module.get("path"), i)?;

        let Some(resources) = module.get("resources") else {
            continue;
        };
        let resources = resources.as_object().ok_or_else(|| {
            StateError::malformed(format!("modules[{}].resources must be an object", i))
        })?;

        for (key, resource) in resources {
            let id = v3_resource_id(key)?.in_module(module_path.clone());
            let attributes = match resource
                .get("primary")
                .and_then(|p| p.get("attributes"))
            {
                None | Some(Value::Null) => BTreeMap::new(),
                Some(Value::Object(flat)) => from_flat_strings(flat),
                Some(_) => {
                    return Err(StateError::malformed(format!(
                        "primary.attributes of {} must be an object",
                        id
                    )))
                }
            };
            tree.insert(id, ResourceState::new(attributes, BTreeSet::new()))?;
        }
    }
    Ok(tree)
}

/// `["root", "net", "subnets"]` → `module.net.module.subnets`
fn v3_module_path(path: Option<&Value>, i: usize) -> Result<String> {
    let segments = path
        .and_then(Value::as_array)
        .ok_or_else(|| StateError::malformed(format!("modules[{}] is missing `path`", i)))?;
    let mut names = Vec::new();
    for (n, segment) in segments.iter().enumerate() {
        let segment = segment.as_str().ok_or_else(|| {
            StateError::malformed(format!("modules[{}].path must contain strings", i))
        })?;
        if n == 0 && segment == "root" {
            continue;
        }
        names.push(format!("module.{}", segment));
    }
    Ok(names.join("."))
}

/// Parse `type.name`, `type.name.N` or `data.type.name[.N]`
fn v3_resource_id(key: &str) -> Result<ResourceId> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let mode = if parts.first() == Some(&"data") {
        parts.remove(0);
        ResourceMode::Data
    } else {
        ResourceMode::Managed
    };

    let (resource_type, name, index) = match parts.as_slice() {
        [t, n] => (*t, *n, None),
        [t, n, idx] => {
            let idx: i64 = idx.parse().map_err(|_| {
                StateError::malformed(format!("resource key `{}` has a non-integer index", key))
            })?;
            (*t, *n, Some(ResourceIndex::Int(idx)))
        }
        _ => {
            return Err(StateError::malformed(format!(
                "unrecognized resource key `{}`",
                key
            )))
        }
    };
    if resource_type.is_empty() || name.is_empty() {
        return Err(StateError::malformed(format!(
            "unrecognized resource key `{}`",
            key
        )));
    }

    let mut id = ResourceId::managed(resource_type, name);
    id.mode = mode;
    id.index = index;
    Ok(id)
}

/// Flat string attributes; drops the `#`/`%` count entries
fn from_flat_strings(flat: &Map<String, Value>) -> BTreeMap<AttributePath, AttributeValue> {
    flat.iter()
        .filter(|(k, _)| {
            let last = k.rsplit('.').next().unwrap_or(k);
            last != "#" && last != "%"
        })
        .map(|(k, v)| (AttributePath::new(k.as_str()), AttributeValue::from_json(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes(v: Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    #[test]
    fn test_parse_v4_header_and_resources() {
        let raw = bytes(json!({
            "version": 4,
            "terraform_version": "1.5.7",
            "serial": 12,
            "lineage": "3f1c-prod",
            "resources": [
                {
                    "mode": "managed",
                    "type": "aws_instance",
                    "name": "web",
                    "instances": [
                        {"index_key": 0, "attributes": {"ami": "ami-1"}},
                        {"index_key": 1, "attributes": {"ami": "ami-2"}}
                    ]
                },
                {
                    "module": "module.net",
                    "mode": "data",
                    "type": "aws_ami",
                    "name": "ubuntu",
                    "instances": [{"attributes": {"id": "ami-1"}}]
                }
            ]
        }));

        let parsed = parse_snapshot(&raw).unwrap();
        assert_eq!(parsed.format_version, 4);
        assert_eq!(parsed.lineage.as_deref(), Some("3f1c-prod"));
        assert_eq!(parsed.serial, Some(12));
        assert_eq!(parsed.tool_version.as_deref(), Some("1.5.7"));
        assert_eq!(parsed.content_hash.len(), 64);

        let addresses: Vec<String> = parsed.tree.resource_ids().map(|id| id.address()).collect();
        assert_eq!(
            addresses,
            vec![
                "aws_instance.web[0]",
                "aws_instance.web[1]",
                "module.net.data.aws_ami.ubuntu",
            ]
        );
    }

    #[test]
    fn test_parse_v4_sensitive_attributes() {
        let raw = bytes(json!({
            "version": 4,
            "resources": [{
                "mode": "managed",
                "type": "aws_db_instance",
                "name": "db",
                "instances": [{
                    "attributes": {"password": "hunter2", "tags": {"Secret": "x", "Name": "db"}},
                    "sensitive_attributes": [
                        [{"type": "get_attr", "value": "password"}],
                        [
                            {"type": "get_attr", "value": "tags"},
                            {"type": "index", "value": {"value": "Secret", "type": "string"}}
                        ]
                    ]
                }]
            }]
        }));
        let tree = build_tree(&raw).unwrap();
        let state = tree
            .resource(&ResourceId::managed("aws_db_instance", "db"))
            .unwrap();
        assert!(state.is_sensitive(&"password".into()));
        assert!(state.is_sensitive(&"tags.Secret".into()));
        assert!(!state.is_sensitive(&"tags.Name".into()));
    }

    #[test]
    fn test_v3_and_v4_share_canonical_ids() {
        let v3 = bytes(json!({
            "version": 3,
            "serial": 1,
            "lineage": "l",
            "modules": [
                {
                    "path": ["root"],
                    "resources": {
                        "aws_instance.web.0": {
                            "type": "aws_instance",
                            "primary": {"id": "i-1", "attributes": {
                                "id": "i-1",
                                "tags.%": "1",
                                "tags.Name": "web"
                            }}
                        },
                        "data.aws_ami.ubuntu": {
                            "type": "aws_ami",
                            "primary": {"id": "ami-1", "attributes": {"id": "ami-1"}}
                        }
                    }
                },
                {
                    "path": ["root", "net"],
                    "resources": {
                        "aws_vpc.main": {
                            "type": "aws_vpc",
                            "primary": {"id": "vpc-1", "attributes": {"id": "vpc-1"}}
                        }
                    }
                }
            ]
        }));
        let v4 = bytes(json!({
            "version": 4,
            "serial": 1,
            "lineage": "l",
            "resources": [
                {"mode": "managed", "type": "aws_instance", "name": "web",
                 "instances": [{"index_key": 0, "attributes": {"id": "i-1", "tags": {"Name": "web"}}}]},
                {"mode": "data", "type": "aws_ami", "name": "ubuntu",
                 "instances": [{"attributes": {"id": "ami-1"}}]},
                {"module": "module.net", "mode": "managed", "type": "aws_vpc", "name": "main",
                 "instances": [{"attributes": {"id": "vpc-1"}}]}
            ]
        }));

        let t3 = build_tree(&v3).unwrap();
        let t4 = build_tree(&v4).unwrap();
        let ids3: Vec<&ResourceId> = t3.resource_ids().collect();
        let ids4: Vec<&ResourceId> = t4.resource_ids().collect();
        assert_eq!(ids3, ids4);

        let web = ResourceId::managed("aws_instance", "web").with_index(ResourceIndex::Int(0));
        let state = t3.resource(&web).unwrap();
        assert_eq!(state.get(&"tags.Name".into()), Some(&"web".into()));
        assert_eq!(state.get(&"tags.%".into()), None);
    }

    #[test]
    fn test_deposed_instances_skipped() {
        let raw = bytes(json!({
            "version": 4,
            "resources": [{
                "mode": "managed", "type": "aws_instance", "name": "web",
                "instances": [
                    {"attributes": {"ami": "new"}},
                    {"deposed": "00000001", "attributes": {"ami": "old"}}
                ]
            }]
        }));
        let tree = build_tree(&raw).unwrap();
        assert_eq!(tree.resource_count(), 1);
    }

    #[test]
    fn test_malformed_inputs() {
        let cases: Vec<Vec<u8>> = vec![
            b"not json".to_vec(),
            bytes(json!([1, 2, 3])),
            bytes(json!({"version": 4})),
            bytes(json!({"version": 4, "resources": {}})),
            bytes(json!({"version": 4, "resources": [{"type": "x", "name": "y"}]})),
            bytes(json!({"version": 4, "resources": [{"type": "x", "instances": []}]})),
            bytes(json!({"version": 4, "resources": [
                {"mode": "weird", "type": "x", "name": "y", "instances": []}
            ]})),
            bytes(json!({"version": 4, "resources": [
                {"type": "x", "name": "y", "instances": [{"attributes": "flat"}]}
            ]})),
            bytes(json!({"version": 4, "serial": "seven", "resources": []})),
            bytes(json!({"version": 2, "modules": []})),
            bytes(json!({"version": 3, "modules": [
                {"path": ["root"], "resources": {"bogus": {}}}
            ]})),
        ];
        for raw in cases {
            let err = build_tree(&raw).unwrap_err();
            assert!(
                matches!(err, StateError::MalformedSnapshot { .. }),
                "expected MalformedSnapshot for {}",
                String::from_utf8_lossy(&raw)
            );
        }
    }

    #[test]
    fn test_duplicate_instance_rejected() {
        let raw = bytes(json!({
            "version": 4,
            "resources": [
                {"type": "aws_vpc", "name": "main", "instances": [{"attributes": {}}]},
                {"type": "aws_vpc", "name": "main", "instances": [{"attributes": {}}]}
            ]
        }));
        assert!(matches!(
            build_tree(&raw),
            Err(StateError::MalformedSnapshot { .. })
        ));
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        let a = br#"{"version":4,"serial":1,"lineage":"l","resources":[]}"#;
        let b = br#"{"lineage":"l","resources":[],"serial":1,"version":4}"#;
        assert_eq!(
            parse_snapshot(a).unwrap().content_hash,
            parse_snapshot(b).unwrap().content_hash
        );
    }
}
