//! Version identifier resolution.

use crate::errors::Result;
use crate::lineage::{LineageKey, LineageRegistry, VersionId, VersionStore};

/// Resolves an optional version identifier against a lineage
pub struct VersionResolver<'a, S> {
    registry: &'a LineageRegistry<S>,
}

impl<'a, S: VersionStore> VersionResolver<'a, S> {
    pub fn new(registry: &'a LineageRegistry<S>) -> Self {
        Self { registry }
    }

    /// `None` (or an empty id) resolves to the lineage's default version;
    /// `Some(id)` must belong to the lineage.
    ///
    /// # Errors
    ///
    /// `UnknownLineage` if the lineage has no versions, `VersionNotFound`
    /// if `id` is not one of them.
    pub fn resolve(
        &self,
        lineage: &LineageKey,
        version_id: Option<&VersionId>,
    ) -> Result<VersionId> {
        match version_id.filter(|id| !id.as_str().is_empty()) {
            None => self.registry.default_version(lineage),
            Some(id) => Ok(self.registry.version_summary(lineage, id)?.version_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StateError;
    use crate::lineage::{MemoryVersionStore, NewVersion};
    use chrono::Utc;

    fn registry() -> LineageRegistry<MemoryVersionStore> {
        let registry = LineageRegistry::new(MemoryVersionStore::new());
        for (id, serial) in [("a", 1), ("b", 2)] {
            registry
                .record_version(NewVersion {
                    lineage: "prod/vpc".into(),
                    version_id: id.into(),
                    serial,
                    created_at: Utc::now(),
                    content_hash: format!("h{}", serial),
                    tool_version: None,
                    resource_count: 0,
                    payload: br#"{"version":4,"resources":[]}"#.to_vec(),
                })
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_resolve_default_and_explicit() {
        let registry = registry();
        let resolver = VersionResolver::new(&registry);
        let lineage = LineageKey::from("prod/vpc");

        assert_eq!(resolver.resolve(&lineage, None).unwrap().as_str(), "b");
        assert_eq!(
            resolver.resolve(&lineage, Some(&"".into())).unwrap().as_str(),
            "b"
        );
        assert_eq!(
            resolver.resolve(&lineage, Some(&"a".into())).unwrap().as_str(),
            "a"
        );
    }

    #[test]
    fn test_resolve_foreign_version() {
        let registry = registry();
        let resolver = VersionResolver::new(&registry);
        let err = resolver
            .resolve(&"prod/vpc".into(), Some(&"zzz".into()))
            .unwrap_err();
        assert!(matches!(err, StateError::VersionNotFound { .. }));

        let err = resolver.resolve(&"other".into(), None).unwrap_err();
        assert!(matches!(err, StateError::UnknownLineage { .. }));
    }
}
