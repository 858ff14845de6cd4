//! Type resolution by fully-qualified name

use std::sync::Arc;

use dashmap::DashMap;
use mirror_types::{TypeHandle, Universe};
use rustc_hash::FxBuildHasher;
use tracing::trace;

use crate::stats::{CacheCounter, CacheStat};

/// Resolves type names against the loaded modules and remembers the answer,
/// including "not found".
///
/// The primary scope is searched first, then every other module in
/// registration order. Names are cached exactly as given.
pub struct TypeRegistry {
    universe: Arc<Universe>,
    primary: Option<String>,
    cache: DashMap<String, Option<TypeHandle>, FxBuildHasher>,
    counter: CacheCounter,
}

impl TypeRegistry {
    /// Create a registry over `universe`.
    ///
    /// `primary` overrides the universe's primary module.
    pub fn new(universe: Arc<Universe>, primary: Option<String>, collect_stats: bool) -> Self {
        Self {
            universe,
            primary,
            cache: DashMap::with_hasher(FxBuildHasher),
            counter: CacheCounter::new(collect_stats),
        }
    }

    /// Resolve a type by name. An empty name is `None` without searching.
    pub fn resolve(&self, name: &str) -> Option<TypeHandle> {
        if name.is_empty() {
            return None;
        }

        if let Some(cached) = self.cache.get(name) {
            self.counter.hit();
            trace!(
                target: "mirror::types",
                type_name = name,
                cache_hit = true,
                found = cached.is_some()
            );
            return cached.value().clone();
        }

        self.counter.miss();
        let found = self.search(name);
        trace!(
            target: "mirror::types",
            type_name = name,
            cache_hit = false,
            found = found.is_some()
        );
        self.cache
            .entry(name.to_string())
            .or_insert(found)
            .value()
            .clone()
    }

    fn search(&self, name: &str) -> Option<TypeHandle> {
        let primary = self
            .primary
            .clone()
            .unwrap_or_else(|| self.universe.primary_name());

        if let Some(module) = self.universe.module(&primary) {
            if let Some(ty) = self.universe.query_type(&module, name) {
                return Some(ty);
            }
        }

        self.universe
            .modules()
            .iter()
            .filter(|m| m.name() != primary)
            .find_map(|m| self.universe.query_type(m, name))
    }

    /// Number of cached names, found or not
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Hit/miss statistics
    pub fn stats(&self) -> CacheStat {
        self.counter.snapshot(self.cache.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_types::{Module, TypeBuilder};

    fn universe() -> Arc<Universe> {
        let universe = Universe::new();
        universe
            .register_module(Module::new("a").with_type(TypeBuilder::class("a", "Shared").build()))
            .unwrap();
        universe
            .register_module(
                Module::new("b")
                    .with_type(TypeBuilder::class("b", "Shared").build())
                    .with_type(TypeBuilder::class("b", "b.Only").build()),
            )
            .unwrap();
        Arc::new(universe)
    }

    #[test]
    fn test_registration_order_wins() {
        let registry = TypeRegistry::new(universe(), None, true);
        assert_eq!(registry.resolve("Shared").unwrap().module(), "a");
        assert_eq!(registry.resolve("b.Only").unwrap().module(), "b");
    }

    #[test]
    fn test_primary_scope_searched_first() {
        let registry = TypeRegistry::new(universe(), Some("b".to_string()), true);
        assert_eq!(registry.resolve("Shared").unwrap().module(), "b");
    }

    #[test]
    fn test_missing_primary_falls_back() {
        let registry = TypeRegistry::new(universe(), Some("nowhere".to_string()), true);
        assert_eq!(registry.resolve("Shared").unwrap().module(), "a");
    }

    #[test]
    fn test_not_found_is_cached() {
        let universe = universe();
        let registry = TypeRegistry::new(universe.clone(), None, true);
        assert!(registry.resolve("Missing").is_none());
        let queries = universe.stats().type_queries();
        assert!(registry.resolve("Missing").is_none());
        assert_eq!(universe.stats().type_queries(), queries);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.stats().hits, 1);
    }

    #[test]
    fn test_empty_name_short_circuits() {
        let universe = universe();
        let registry = TypeRegistry::new(universe.clone(), None, true);
        assert!(registry.resolve("").is_none());
        assert_eq!(universe.stats().type_queries(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_names_are_not_normalized() {
        let registry = TypeRegistry::new(universe(), None, true);
        assert!(registry.resolve("b.Only").is_some());
        assert!(registry.resolve("B.ONLY").is_none());
        assert_eq!(registry.len(), 2);
    }
}
