//! Content hashing
//!
//! Hashes are lowercase hex SHA-256 over canonical JSON (object keys sorted
//! at every level), so two payloads that differ only in key order hash equal.

use crate::errors::Result;
use crate::tree::AttributeTree;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn hash_string(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Rebuild a value with object keys in sorted order
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    out.insert(key.clone(), canonicalize(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Hash of a raw snapshot payload
pub fn content_hash(raw: &Value) -> String {
    hash_string(&canonicalize(raw).to_string())
}

/// Hash of a normalized tree
///
/// # Errors
///
/// `Serialization` if the tree cannot be serialized.
pub fn tree_digest(tree: &AttributeTree) -> Result<String> {
    let value = serde_json::to_value(tree)?;
    Ok(content_hash(&value))
}
