//! Member metadata cache
//!
//! Fields, properties, methods and constructors are resolved through the
//! universe's live queries at most once per [`MemberKey`]. Failed lookups
//! are stored too, so probing for an optional member costs one query in
//! total.

use std::sync::Arc;

use dashmap::DashMap;
use mirror_types::{
    AttributeEntry, BindingFlags, ConstructorHandle, FieldHandle, MethodHandle, PropertyHandle,
    TypeDef, TypeRef, Universe,
};
use rustc_hash::FxBuildHasher;
use tracing::trace;

use crate::error::{require_name, ReflectResult};
use crate::key::{MemberKey, MemberKind, Signature};
use crate::stats::{CacheCounter, CacheStat};

/// A resolved member of any kind
#[derive(Debug, Clone)]
pub enum MemberDescriptor {
    /// Field
    Field(FieldHandle),
    /// Property
    Property(PropertyHandle),
    /// Method
    Method(MethodHandle),
    /// Constructor
    Constructor(ConstructorHandle),
}

impl MemberDescriptor {
    /// Member kind
    pub fn kind(&self) -> MemberKind {
        match self {
            MemberDescriptor::Field(_) => MemberKind::Field,
            MemberDescriptor::Property(_) => MemberKind::Property,
            MemberDescriptor::Method(_) => MemberKind::Method,
            MemberDescriptor::Constructor(_) => MemberKind::Constructor,
        }
    }

    /// Member name, empty for constructors
    pub fn name(&self) -> &str {
        match self {
            MemberDescriptor::Field(f) => f.name(),
            MemberDescriptor::Property(p) => p.name(),
            MemberDescriptor::Method(m) => m.name(),
            MemberDescriptor::Constructor(_) => "",
        }
    }

    /// Declaring type
    pub fn declaring_type(&self) -> &TypeRef {
        match self {
            MemberDescriptor::Field(f) => f.declaring_type(),
            MemberDescriptor::Property(p) => p.declaring_type(),
            MemberDescriptor::Method(m) => m.declaring_type(),
            MemberDescriptor::Constructor(c) => c.declaring_type(),
        }
    }

    /// Attributes declared on the member itself
    pub fn attributes(&self) -> &[AttributeEntry] {
        match self {
            MemberDescriptor::Field(f) => f.attributes(),
            MemberDescriptor::Property(p) => p.attributes(),
            MemberDescriptor::Method(m) => m.attributes(),
            MemberDescriptor::Constructor(c) => c.attributes(),
        }
    }
}

/// One keyed table plus its counter
struct MemberMap<V> {
    entries: DashMap<MemberKey, V, FxBuildHasher>,
    counter: CacheCounter,
}

impl<V: Clone> MemberMap<V> {
    fn new(collect_stats: bool) -> Self {
        Self {
            entries: DashMap::with_hasher(FxBuildHasher),
            counter: CacheCounter::new(collect_stats),
        }
    }

    /// Return the cached value or run `query` and store its result.
    ///
    /// The query runs without holding a map lock. If two threads miss
    /// together, the first insert wins and both return that value.
    fn get_or_query(&self, key: MemberKey, query: impl FnOnce() -> V) -> V {
        if let Some(cached) = self.entries.get(&key) {
            self.counter.hit();
            trace!(
                target: "mirror::members",
                kind = ?key.kind,
                member = %key.name,
                owner = key.owner.as_u32(),
                cache_hit = true
            );
            return cached.value().clone();
        }

        self.counter.miss();
        trace!(
            target: "mirror::members",
            kind = ?key.kind,
            member = %key.name,
            owner = key.owner.as_u32(),
            cache_hit = false
        );
        let value = query();
        self.entries.entry(key).or_insert(value).value().clone()
    }

    fn stats(&self) -> CacheStat {
        self.counter.snapshot(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cache of member descriptors keyed by type, name, binding flags and
/// signature
pub struct MemberMetadataCache {
    universe: Arc<Universe>,
    fields: MemberMap<Option<FieldHandle>>,
    properties: MemberMap<Option<PropertyHandle>>,
    methods: MemberMap<Option<MethodHandle>>,
    overloads: MemberMap<Arc<[MethodHandle]>>,
    constructors: MemberMap<Option<ConstructorHandle>>,
}

impl MemberMetadataCache {
    /// Create an empty cache over `universe`
    pub fn new(universe: Arc<Universe>, collect_stats: bool) -> Self {
        Self {
            universe,
            fields: MemberMap::new(collect_stats),
            properties: MemberMap::new(collect_stats),
            methods: MemberMap::new(collect_stats),
            overloads: MemberMap::new(collect_stats),
            constructors: MemberMap::new(collect_stats),
        }
    }

    /// The universe this cache queries
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Resolve a field visible under `flags`
    pub fn resolve_field(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
    ) -> ReflectResult<Option<FieldHandle>> {
        require_name(name, "field")?;
        let key = MemberKey::named(ty.id(), MemberKind::Field, name, flags);
        Ok(self
            .fields
            .get_or_query(key, || self.universe.query_field(ty, name, flags)))
    }

    /// Resolve a property visible under `flags`
    pub fn resolve_property(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
    ) -> ReflectResult<Option<PropertyHandle>> {
        require_name(name, "property")?;
        let key = MemberKey::named(ty.id(), MemberKind::Property, name, flags);
        Ok(self
            .properties
            .get_or_query(key, || self.universe.query_property(ty, name, flags)))
    }

    /// Resolve a method.
    ///
    /// With `Signature::Any` the first declared method with the name is
    /// returned, the type's own methods before inherited ones.
    pub fn resolve_method(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
        signature: Signature,
    ) -> ReflectResult<Option<MethodHandle>> {
        require_name(name, "method")?;
        let key = MemberKey::method(ty.id(), name, flags, signature.clone());
        Ok(self.methods.get_or_query(key, || {
            self.universe
                .query_method(ty, name, flags, signature.as_slice())
        }))
    }

    /// Every method with the name visible under `flags`, in declaration
    /// order with the type's own methods first
    pub fn resolve_overloads(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
    ) -> ReflectResult<Arc<[MethodHandle]>> {
        require_name(name, "method")?;
        let key = MemberKey::method(ty.id(), name, flags, Signature::Any);
        Ok(self.overloads.get_or_query(key, || {
            Arc::from(self.universe.query_methods_named(ty, name, flags))
        }))
    }

    /// Resolve a constructor declared on `ty`.
    ///
    /// Constructors are keyed by signature alone and are never inherited.
    pub fn resolve_constructor(
        &self,
        ty: &TypeDef,
        flags: BindingFlags,
        signature: Signature,
    ) -> Option<ConstructorHandle> {
        let key = MemberKey::constructor(ty.id(), flags, signature.clone());
        self.constructors.get_or_query(key, || {
            self.universe
                .query_constructor(ty, flags, signature.as_slice())
        })
    }

    /// Resolve a named member: property first, then field, then method
    pub fn resolve_member(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
    ) -> ReflectResult<Option<MemberDescriptor>> {
        if let Some(p) = self.resolve_property(ty, name, flags)? {
            return Ok(Some(MemberDescriptor::Property(p)));
        }
        if let Some(f) = self.resolve_field(ty, name, flags)? {
            return Ok(Some(MemberDescriptor::Field(f)));
        }
        Ok(self
            .resolve_method(ty, name, flags, Signature::Any)?
            .map(MemberDescriptor::Method))
    }

    /// Total number of cached entries
    pub fn len(&self) -> usize {
        self.fields.len()
            + self.properties.len()
            + self.methods.len()
            + self.overloads.len()
            + self.constructors.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field cache statistics
    pub fn field_stats(&self) -> CacheStat {
        self.fields.stats()
    }

    /// Property cache statistics
    pub fn property_stats(&self) -> CacheStat {
        self.properties.stats()
    }

    /// Method cache statistics
    pub fn method_stats(&self) -> CacheStat {
        self.methods.stats()
    }

    /// Overload group cache statistics
    pub fn overload_stats(&self) -> CacheStat {
        self.overloads.stats()
    }

    /// Constructor cache statistics
    pub fn constructor_stats(&self) -> CacheStat {
        self.constructors.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_types::{
        ConstructorDefinition, FieldDefinition, MethodDefinition, Module, Primitive,
        PropertyDefinition, TypeBuilder, TypeHandle, Value,
    };

    fn setup() -> (Arc<Universe>, TypeHandle) {
        let account = TypeBuilder::class("bank", "bank.Account")
            .field(FieldDefinition::new("balance", Primitive::I64).private())
            .field(FieldDefinition::new("Owner", Primitive::String))
            .property(
                PropertyDefinition::new("Balance", Primitive::I64)
                    .getter(|_| Ok(Value::I64(0))),
            )
            .method(
                MethodDefinition::new("Deposit", |_, _| Ok(Value::Null))
                    .param("amount", Primitive::I64),
            )
            .method(
                MethodDefinition::new("Deposit", |_, _| Ok(Value::Null))
                    .param("amount", Primitive::String),
            )
            .constructor(ConstructorDefinition::empty())
            .constructor(ConstructorDefinition::empty().param("owner", Primitive::String))
            .build();
        let universe = Universe::new();
        universe
            .register_module(Module::new("bank").with_type(account.clone()))
            .unwrap();
        (Arc::new(universe), account)
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let (universe, account) = setup();
        let cache = MemberMetadataCache::new(universe, true);
        let first = cache
            .resolve_field(&account, "Owner", BindingFlags::DEFAULT)
            .unwrap()
            .unwrap();
        let second = cache
            .resolve_field(&account, "Owner", BindingFlags::DEFAULT)
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.field_stats().hits, 1);
        assert_eq!(cache.field_stats().misses, 1);
    }

    #[test]
    fn test_negative_result_is_cached() {
        let (universe, account) = setup();
        let cache = MemberMetadataCache::new(universe.clone(), true);
        assert!(cache
            .resolve_property(&account, "Missing", BindingFlags::ALL)
            .unwrap()
            .is_none());
        let queries = universe.stats().member_queries();
        for _ in 0..10 {
            assert!(cache
                .resolve_property(&account, "Missing", BindingFlags::ALL)
                .unwrap()
                .is_none());
        }
        assert_eq!(universe.stats().member_queries(), queries);
    }

    #[test]
    fn test_flags_are_part_of_the_key() {
        let (universe, account) = setup();
        let cache = MemberMetadataCache::new(universe, true);
        let public = BindingFlags::PUBLIC | BindingFlags::INSTANCE;
        assert!(cache
            .resolve_field(&account, "balance", public)
            .unwrap()
            .is_none());
        assert!(cache
            .resolve_field(&account, "balance", BindingFlags::ALL_INSTANCE)
            .unwrap()
            .is_some());
        // Both outcomes stay cached side by side
        assert!(cache
            .resolve_field(&account, "balance", public)
            .unwrap()
            .is_none());
        assert_eq!(cache.field_stats().size, 2);
    }

    #[test]
    fn test_method_signatures() {
        let (universe, account) = setup();
        let cache = MemberMetadataCache::new(universe, true);
        let by_string = cache
            .resolve_method(
                &account,
                "Deposit",
                BindingFlags::DEFAULT,
                Signature::exact([Primitive::String.type_id()]),
            )
            .unwrap()
            .unwrap();
        assert_eq!(by_string.parameters()[0].ty.id(), Primitive::String.type_id());

        let first = cache
            .resolve_method(&account, "Deposit", BindingFlags::DEFAULT, Signature::Any)
            .unwrap()
            .unwrap();
        assert_eq!(first.parameters()[0].ty.id(), Primitive::I64.type_id());

        let none = cache
            .resolve_method(
                &account,
                "Deposit",
                BindingFlags::DEFAULT,
                Signature::exact([Primitive::Bool.type_id()]),
            )
            .unwrap();
        assert!(none.is_none());

        let group = cache
            .resolve_overloads(&account, "Deposit", BindingFlags::DEFAULT)
            .unwrap();
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_constructor_by_signature() {
        let (universe, account) = setup();
        let cache = MemberMetadataCache::new(universe, true);
        let flags = BindingFlags::ALL_INSTANCE;
        let default = cache
            .resolve_constructor(&account, flags, Signature::empty())
            .unwrap();
        assert!(default.parameters().is_empty());
        let named = cache
            .resolve_constructor(&account, flags, Signature::exact([Primitive::String.type_id()]))
            .unwrap();
        assert_eq!(named.parameters().len(), 1);
        assert!(cache
            .resolve_constructor(&account, flags, Signature::exact([Primitive::I32.type_id()]))
            .is_none());
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let (universe, account) = setup();
        let cache = MemberMetadataCache::new(universe, true);
        let err = cache
            .resolve_field(&account, "", BindingFlags::ALL)
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_resolve_member_prefers_property() {
        let (universe, account) = setup();
        let cache = MemberMetadataCache::new(universe, true);
        let member = cache
            .resolve_member(&account, "Balance", BindingFlags::ALL)
            .unwrap()
            .unwrap();
        assert_eq!(member.kind(), MemberKind::Property);
        let member = cache
            .resolve_member(&account, "Deposit", BindingFlags::ALL)
            .unwrap()
            .unwrap();
        assert_eq!(member.kind(), MemberKind::Method);
        assert_eq!(member.declaring_type().id(), account.id());
    }
}
