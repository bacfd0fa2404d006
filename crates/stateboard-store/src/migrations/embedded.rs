//! Migration files compiled into the binary

pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// Application order is slice order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        id: "001_versions",
        sql: include_str!("../../migrations/001_versions.sql"),
    },
    Migration {
        id: "002_resource_index",
        sql: include_str!("../../migrations/002_resource_index.sql"),
    },
];
