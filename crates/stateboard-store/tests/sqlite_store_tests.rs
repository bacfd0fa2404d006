//! SQLite store scenarios: persistence across reopen, compare-and-insert,
//! and the browsing index.

mod common;

use chrono::{TimeZone, Utc};
use common::{managed, v4_state};
use serde_json::{json, Value};
use stateboard_core::errors::StateError;
use stateboard_core::lineage::{
    LineageKey, LineageRegistry, NewVersion, RecordOutcome, VersionId, VersionStore,
};
use stateboard_core::tree::parse_snapshot;
use stateboard_store::search::ToolVersionOrder;
use stateboard_store::{AttributeQuery, SqliteVersionStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_version(raw: Vec<u8>, id: &str, minute: u32) -> NewVersion {
    let parsed = parse_snapshot(&raw).unwrap();
    NewVersion::from_snapshot(&parsed, raw)
        .unwrap()
        .with_version_id(VersionId::new(id))
        .with_created_at(Utc.with_ymd_and_hms(2024, 6, 1, 9, minute, 0).unwrap())
}

fn network(lineage: &str, serial: u64, cidr: &str) -> Vec<u8> {
    v4_state(
        lineage,
        serial,
        json!([
            managed("aws_vpc", "main", json!({"cidr_block": cidr, "tags": {"Name": "main"}})),
            managed(
                "aws_db_instance",
                "primary",
                json!({"engine": "postgres", "password": "hunter2"})
            )
        ]),
    )
}

fn with_sensitive_password(raw: Vec<u8>) -> Vec<u8> {
    let mut doc: Value = serde_json::from_slice(&raw).unwrap();
    doc["resources"][1]["instances"][0]["sensitive_attributes"] =
        json!([[{"type": "get_attr", "value": "password"}]]);
    serde_json::to_vec(&doc).unwrap()
}

fn seeded_store() -> SqliteVersionStore {
    let store = SqliteVersionStore::open_in_memory().unwrap();
    store
        .insert_version(new_version(
            with_sensitive_password(network("prod", 1, "10.0.0.0/16")),
            "p1",
            0,
        ))
        .unwrap();
    store
        .insert_version(new_version(
            with_sensitive_password(network("prod", 2, "10.1.0.0/16")),
            "p2",
            1,
        ))
        .unwrap();
    store
        .insert_version(new_version(network("staging", 1, "172.16.0.0/16"), "s1", 2))
        .unwrap();
    store
}

// ---------------------------------------------------------------------------
// Version ledger
// ---------------------------------------------------------------------------

#[test]
fn test_versions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stateboard.db");

    {
        let store = SqliteVersionStore::open(&path).unwrap();
        store
            .insert_version(new_version(network("prod", 1, "10.0.0.0/16"), "p1", 0))
            .unwrap();
    }

    let store = SqliteVersionStore::open(&path).unwrap();
    let record = store
        .load_version(&LineageKey::new("prod"), &VersionId::new("p1"))
        .unwrap()
        .expect("version should persist");
    assert_eq!(record.summary.serial, 1);
    assert_eq!(record.summary.resource_count, 2);
    assert_eq!(record.summary.tool_version.as_deref(), Some("1.5.7"));
    assert_eq!(record.tree().unwrap().resource_count(), 2);
}

#[test]
fn test_reingest_same_content_is_idempotent() {
    let store = SqliteVersionStore::open_in_memory().unwrap();
    let raw = network("prod", 1, "10.0.0.0/16");

    let first = store.insert_version(new_version(raw.clone(), "p1", 0)).unwrap();
    let second = store.insert_version(new_version(raw, "p1-again", 5)).unwrap();

    assert_eq!(second.version_id, first.version_id);
    assert_eq!(
        store.list_version_summaries(&LineageKey::new("prod")).unwrap().len(),
        1
    );
}

#[test]
fn test_divergent_serial_is_rejected() {
    let store = SqliteVersionStore::open_in_memory().unwrap();
    store
        .insert_version(new_version(network("prod", 1, "10.0.0.0/16"), "p1", 0))
        .unwrap();

    let err = store
        .insert_version(new_version(network("prod", 1, "10.9.0.0/16"), "p1b", 1))
        .unwrap_err();
    match err {
        StateError::DivergentVersion { lineage, serial, .. } => {
            assert_eq!(lineage, "prod");
            assert_eq!(serial, 1);
        }
        other => panic!("expected DivergentVersion, got {:?}", other),
    }

    // The recorded version is untouched
    let record = store
        .load_version(&LineageKey::new("prod"), &VersionId::new("p1"))
        .unwrap()
        .unwrap();
    let tree = record.tree().unwrap();
    let vpc = tree.resource_ids().find(|id| id.resource_type == "aws_vpc").unwrap();
    assert_eq!(
        tree.resource(vpc).unwrap().get(&"cidr_block".into()).unwrap().to_string(),
        "10.0.0.0/16"
    );
}

#[test]
fn test_duplicate_version_id_is_persistence_error() {
    let store = SqliteVersionStore::open_in_memory().unwrap();
    store
        .insert_version(new_version(network("prod", 1, "10.0.0.0/16"), "p1", 0))
        .unwrap();

    let err = store
        .insert_version(new_version(network("prod", 2, "10.1.0.0/16"), "p1", 1))
        .unwrap_err();
    assert!(matches!(err, StateError::Persistence { .. }));
}

#[test]
fn test_registry_over_sqlite_store() {
    let registry = LineageRegistry::new(SqliteVersionStore::open_in_memory().unwrap());
    let lineage = LineageKey::new("prod");

    let outcome = registry
        .record_version(new_version(network("prod", 1, "10.0.0.0/16"), "p1", 0))
        .unwrap();
    assert!(matches!(outcome, RecordOutcome::Recorded(_)));
    registry
        .record_version(new_version(network("prod", 2, "10.1.0.0/16"), "p2", 1))
        .unwrap();

    assert_eq!(registry.default_version(&lineage).unwrap(), VersionId::new("p2"));
    let ids: Vec<String> = registry
        .list_versions(&lineage)
        .unwrap()
        .into_iter()
        .map(|v| v.version_id.to_string())
        .collect();
    assert_eq!(ids, vec!["p2", "p1"]);

    let activity = registry.lineage_activity(&lineage).unwrap();
    assert_eq!(activity.entries.len(), 2);
    assert_eq!(activity.entries[1].change_count, 1);
}

#[test]
fn test_list_lineages_most_recent_first() {
    let store = seeded_store();

    let lineages = store.list_lineages(None).unwrap();
    let keys: Vec<&str> = lineages.iter().map(|l| l.lineage.as_str()).collect();
    assert_eq!(keys, vec!["staging", "prod"]);
    assert_eq!(lineages[1].version_count, 2);
    assert_eq!(lineages[1].latest_serial, 2);

    assert_eq!(store.list_lineages(Some(1)).unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Browsing index
// ---------------------------------------------------------------------------

#[test]
fn test_search_only_looks_at_latest_versions() {
    let store = seeded_store();

    let page = store
        .search_attributes(&AttributeQuery {
            attribute_key: Some("cidr_block".to_string()),
            ..AttributeQuery::default()
        })
        .unwrap();

    assert_eq!(page.total, 2);
    let values: Vec<(&str, Option<&str>)> = page
        .matches
        .iter()
        .map(|m| (m.lineage.as_str(), m.value.as_deref()))
        .collect();
    assert_eq!(
        values,
        vec![("prod", Some("10.1.0.0/16")), ("staging", Some("172.16.0.0/16"))]
    );
    assert_eq!(page.matches[0].version_id, VersionId::new("p2"));
}

#[test]
fn test_search_by_value_substring_escapes_wildcards() {
    let store = seeded_store();

    let page = store
        .search_attributes(&AttributeQuery {
            value_contains: Some("10.1.".to_string()),
            ..AttributeQuery::default()
        })
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.matches[0].resource.address(), "aws_vpc.main");

    let page = store
        .search_attributes(&AttributeQuery {
            value_contains: Some("%".to_string()),
            ..AttributeQuery::default()
        })
        .unwrap();
    assert_eq!(page.total, 0);
}

#[test]
fn test_sensitive_values_are_not_stored_or_matched() {
    let store = seeded_store();

    let page = store
        .search_attributes(&AttributeQuery {
            lineage: Some("prod".to_string()),
            attribute_key: Some("password".to_string()),
            ..AttributeQuery::default()
        })
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.matches[0].sensitive);
    assert_eq!(page.matches[0].value, None);

    let page = store
        .search_attributes(&AttributeQuery {
            value_contains: Some("hunter2".to_string()),
            ..AttributeQuery::default()
        })
        .unwrap();
    // Only staging stores the password in the clear
    let lineages: Vec<&str> = page.matches.iter().map(|m| m.lineage.as_str()).collect();
    assert_eq!(lineages, vec!["staging"]);
}

#[test]
fn test_search_pagination() {
    let store = seeded_store();
    let query = AttributeQuery {
        lineage: Some("prod".to_string()),
        limit: 2,
        ..AttributeQuery::default()
    };

    let first = store.search_attributes(&query).unwrap();
    let second = store
        .search_attributes(&AttributeQuery {
            offset: 2,
            ..query.clone()
        })
        .unwrap();

    // engine, password, cidr_block, tags.Name
    assert_eq!(first.total, 4);
    assert_eq!(first.matches.len(), 2);
    assert_eq!(second.matches.len(), 2);
    assert_ne!(first.matches[0], second.matches[0]);
}

#[test]
fn test_resource_type_name_and_key_listings() {
    let store = seeded_store();

    let types = store.list_resource_types().unwrap();
    let types: Vec<(&str, u64)> = types
        .iter()
        .map(|t| (t.resource_type.as_str(), t.count))
        .collect();
    assert_eq!(types, vec![("aws_db_instance", 2), ("aws_vpc", 2)]);

    assert_eq!(
        store.list_resource_names(Some("aws_vpc")).unwrap(),
        vec!["main".to_string()]
    );
    assert_eq!(
        store.list_resource_names(None).unwrap(),
        vec!["main".to_string(), "primary".to_string()]
    );
    assert_eq!(
        store.list_attribute_keys(Some("aws_vpc")).unwrap(),
        vec!["cidr_block".to_string(), "tags.Name".to_string()]
    );
}

#[test]
fn test_tool_versions_count_latest_versions() {
    let store = SqliteVersionStore::open_in_memory().unwrap();
    let mut old = serde_json::from_slice::<Value>(&network("prod", 1, "10.0.0.0/16")).unwrap();
    old["terraform_version"] = json!("1.3.0");
    store
        .insert_version(new_version(serde_json::to_vec(&old).unwrap(), "p1", 0))
        .unwrap();
    store
        .insert_version(new_version(network("prod", 2, "10.0.0.0/16"), "p2", 1))
        .unwrap();
    store
        .insert_version(new_version(network("staging", 1, "10.0.0.0/16"), "s1", 2))
        .unwrap();

    let versions = store.list_tool_versions(ToolVersionOrder::Count).unwrap();
    let versions: Vec<(&str, u64)> = versions
        .iter()
        .map(|v| (v.tool_version.as_str(), v.count))
        .collect();
    assert_eq!(versions, vec![("1.5.7", 2)]);
}
