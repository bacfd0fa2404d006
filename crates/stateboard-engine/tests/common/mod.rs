use serde_json::{json, Value};
use stateboard_engine::Board;
use stateboard_core::lineage::LineageRegistry;
use stateboard_store::SqliteVersionStore;

/// Serialize a v4 snapshot with the given resources array
#[allow(dead_code)]
pub fn v4_state(lineage: &str, serial: u64, resources: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "version": 4,
        "terraform_version": "1.5.7",
        "serial": serial,
        "lineage": lineage,
        "outputs": {},
        "resources": resources,
    }))
    .unwrap()
}

/// One managed root-module resource with a single unindexed instance
#[allow(dead_code)]
pub fn managed(resource_type: &str, name: &str, attributes: Value) -> Value {
    json!({
        "mode": "managed",
        "type": resource_type,
        "name": name,
        "instances": [{"schema_version": 0, "attributes": attributes}]
    })
}

#[allow(dead_code)]
pub fn board() -> Board {
    LineageRegistry::new(SqliteVersionStore::open_in_memory().unwrap())
}
