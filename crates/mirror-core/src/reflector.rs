//! The reflection facade
//!
//! A [`Reflector`] owns one generation of caches. Every call takes a
//! snapshot of the current generation and works on it alone;
//! [`Reflector::clear_all_caches`] installs a fresh generation in one swap.
//! A caller therefore observes either every old cache or every new one.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use mirror_types::{
    BindingFlags, ConstructorHandle, FieldHandle, MethodHandle, ObjectRef, PropertyHandle,
    Reflected, TypeDef, TypeHandle, TypeId, Universe, Value,
};
use parking_lot::RwLock;
use tracing::info;

use crate::accessors::{AccessorCompiler, Getter, Setter};
use crate::attributes::{AttributeInspector, AttributeTarget};
use crate::config::ReflectorConfig;
use crate::delegate::DelegateShape;
use crate::error::{ReflectError, ReflectResult};
use crate::invoke::{Factory, InvocationDispatcher, Receiver};
use crate::key::Signature;
use crate::members::MemberMetadataCache;
use crate::stats::CacheStats;
use crate::types::TypeRegistry;

/// One generation of every cache
struct CacheSet {
    types: TypeRegistry,
    members: Arc<MemberMetadataCache>,
    accessors: AccessorCompiler,
    dispatcher: InvocationDispatcher,
    attributes: AttributeInspector,
}

impl CacheSet {
    fn new(universe: &Arc<Universe>, config: &ReflectorConfig) -> Self {
        let stats = config.collect_stats;
        let members = Arc::new(MemberMetadataCache::new(universe.clone(), stats));
        Self {
            types: TypeRegistry::new(universe.clone(), config.primary_scope.clone(), stats),
            accessors: AccessorCompiler::new(members.clone(), config.accessor_flags, stats),
            dispatcher: InvocationDispatcher::new(
                members.clone(),
                config.invoke_flags,
                config.constructor_flags,
                stats,
            ),
            attributes: AttributeInspector::new(members.clone()),
            members,
        }
    }

    fn entry_count(&self) -> usize {
        self.types.len() + self.members.len() + self.accessors.len() + self.dispatcher.len()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            types: self.types.stats(),
            fields: self.members.field_stats(),
            properties: self.members.property_stats(),
            methods: self.members.method_stats(),
            overloads: self.members.overload_stats(),
            constructors: self.members.constructor_stats(),
            getters: self.accessors.getter_stats(),
            setters: self.accessors.setter_stats(),
            factories: self.dispatcher.factory_stats(),
            invokers: self.dispatcher.invoker_stats(),
        }
    }
}

/// Cached reflection over a [`Universe`]
///
/// # Example
///
/// ```ignore
/// let reflector = Reflector::new(universe);
/// let point = reflector.resolve_type("geometry.Point").unwrap();
/// let get_x = reflector.compile_getter::<i32>(&point, "X")?;
/// let obj = reflector.create_instance(&point, &[])?;
/// assert_eq!(get_x(&obj)?, 0);
/// ```
pub struct Reflector {
    universe: Arc<Universe>,
    config: ReflectorConfig,
    caches: RwLock<Arc<CacheSet>>,
}

impl Reflector {
    /// Create a reflector with the default configuration
    pub fn new(universe: Arc<Universe>) -> Self {
        Self::build(universe, ReflectorConfig::default())
    }

    /// Create a reflector with an explicit configuration, rejecting one that
    /// fails [`ReflectorConfig::validate`]
    pub fn with_config(universe: Arc<Universe>, config: ReflectorConfig) -> ReflectResult<Self> {
        config.validate()?;
        Ok(Self::build(universe, config))
    }

    /// Create a reflector configured from a TOML file
    pub fn from_config_file(universe: Arc<Universe>, path: &Path) -> ReflectResult<Self> {
        let config = ReflectorConfig::from_file(path)?;
        Ok(Self::build(universe, config))
    }

    fn build(universe: Arc<Universe>, config: ReflectorConfig) -> Self {
        let caches = Arc::new(CacheSet::new(&universe, &config));
        Self {
            universe,
            config,
            caches: RwLock::new(caches),
        }
    }

    /// The wrapped universe
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Active configuration
    pub fn config(&self) -> &ReflectorConfig {
        &self.config
    }

    fn caches(&self) -> Arc<CacheSet> {
        self.caches.read().clone()
    }

    // ========================================================================
    // Types and members
    // ========================================================================

    /// Resolve a type by fully-qualified name
    pub fn resolve_type(&self, name: &str) -> Option<TypeHandle> {
        self.caches().types.resolve(name)
    }

    /// Resolve a field
    pub fn resolve_field(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
    ) -> ReflectResult<Option<FieldHandle>> {
        self.caches().members.resolve_field(ty, name, flags)
    }

    /// Resolve a property
    pub fn resolve_property(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
    ) -> ReflectResult<Option<PropertyHandle>> {
        self.caches().members.resolve_property(ty, name, flags)
    }

    /// Resolve a method by name and signature
    pub fn resolve_method(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
        signature: Signature,
    ) -> ReflectResult<Option<MethodHandle>> {
        self.caches()
            .members
            .resolve_method(ty, name, flags, signature)
    }

    /// Resolve a constructor by signature
    pub fn resolve_constructor(
        &self,
        ty: &TypeDef,
        flags: BindingFlags,
        signature: Signature,
    ) -> Option<ConstructorHandle> {
        self.caches()
            .members
            .resolve_constructor(ty, flags, signature)
    }

    /// Whether `sub` is `ancestor` or derives from it
    pub fn is_subclass_of(&self, sub: &TypeDef, ancestor: TypeId) -> bool {
        self.universe.is_subclass_of(sub, ancestor)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Compile, or fetch, a getter reading `name` as `R`
    pub fn compile_getter<R: Reflected>(&self, ty: &TypeDef, name: &str) -> ReflectResult<Getter<R>> {
        self.caches().accessors.compile_getter(ty, name)
    }

    /// Compile, or fetch, a setter writing a `V` into `name`
    pub fn compile_setter<V: Reflected>(&self, ty: &TypeDef, name: &str) -> ReflectResult<Setter<V>> {
        self.caches().accessors.compile_setter(ty, name)
    }

    /// Read a member of an instance
    pub fn get_value<R: Reflected>(&self, instance: &ObjectRef, name: &str) -> ReflectResult<R> {
        self.caches().accessors.get_value(instance, name)
    }

    /// Write a member of an instance
    pub fn set_value<V: Reflected>(&self, instance: &ObjectRef, name: &str, value: V) -> ReflectResult<()> {
        self.caches().accessors.set_value(instance, name, value)
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Call a method on a receiver
    pub fn invoke(&self, receiver: &Receiver, name: &str, args: &[Value]) -> ReflectResult<Value> {
        self.caches().dispatcher.invoke(receiver, name, args)
    }

    /// Call a static method of `ty`
    pub fn invoke_static(&self, ty: &TypeHandle, name: &str, args: &[Value]) -> ReflectResult<Value> {
        self.invoke(&Receiver::Static(ty.clone()), name, args)
    }

    /// Create an instance of `ty`
    pub fn create_instance(&self, ty: &TypeHandle, args: &[Value]) -> ReflectResult<Value> {
        self.caches().dispatcher.create_instance(ty, args)
    }

    /// Resolve a type by name and create an instance of it
    pub fn create_instance_by_name(&self, type_name: &str, args: &[Value]) -> ReflectResult<Value> {
        let ty = self
            .resolve_type(type_name)
            .ok_or_else(|| ReflectError::invalid(format!("type not found: '{type_name}'")))?;
        self.create_instance(&ty, args)
    }

    /// The cached no-argument factory of `ty`
    pub fn compile_factory(&self, ty: &TypeHandle) -> ReflectResult<Factory> {
        self.caches().dispatcher.compile_factory(ty)
    }

    /// Bind a method to a delegate shape
    pub fn create_bound_invoker<S: DelegateShape>(
        &self,
        receiver: &Receiver,
        name: &str,
    ) -> ReflectResult<S::Delegate> {
        self.caches()
            .dispatcher
            .create_bound_invoker::<S>(receiver, name)
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// First attribute of type `A` on a type or member
    pub fn attribute<A: Any + Send + Sync>(
        &self,
        target: AttributeTarget<'_>,
        inherit: bool,
    ) -> Option<Arc<A>> {
        self.caches().attributes.attribute(target, inherit)
    }

    /// Every attribute of type `A` on a type or member
    pub fn attributes<A: Any + Send + Sync>(
        &self,
        target: AttributeTarget<'_>,
        inherit: bool,
    ) -> Vec<Arc<A>> {
        self.caches().attributes.attributes(target, inherit)
    }

    /// Whether a type or member carries an attribute of type `A`
    pub fn has_attribute<A: Any + Send + Sync>(
        &self,
        target: AttributeTarget<'_>,
        inherit: bool,
    ) -> bool {
        self.caches().attributes.has_attribute::<A>(target, inherit)
    }

    /// First attribute of type `A` on a member found by name
    pub fn member_attribute<A: Any + Send + Sync>(
        &self,
        ty: &TypeDef,
        name: &str,
        inherit: bool,
    ) -> ReflectResult<Option<Arc<A>>> {
        self.caches().attributes.member_attribute(ty, name, inherit)
    }

    /// Every attribute of type `A` on a member found by name
    pub fn member_attributes<A: Any + Send + Sync>(
        &self,
        ty: &TypeDef,
        name: &str,
        inherit: bool,
    ) -> ReflectResult<Vec<Arc<A>>> {
        self.caches().attributes.member_attributes(ty, name, inherit)
    }

    /// Every loaded type carrying an attribute of type `A`
    pub fn types_with_attribute<A: Any + Send + Sync>(&self, inherit: bool) -> Vec<TypeHandle> {
        self.caches().attributes.types_with_attribute::<A>(inherit)
    }

    // ========================================================================
    // Cache management
    // ========================================================================

    /// Hit/miss statistics of the current generation
    pub fn stats(&self) -> CacheStats {
        self.caches().stats()
    }

    /// Number of entries across every cache
    pub fn cached_entries(&self) -> usize {
        self.caches().entry_count()
    }

    /// Drop every cached type, member, accessor, factory and invoker.
    ///
    /// Counters restart from zero. Closures handed out earlier keep working;
    /// they are simply no longer returned by lookups.
    pub fn clear_all_caches(&self) {
        let fresh = Arc::new(CacheSet::new(&self.universe, &self.config));
        let old = std::mem::replace(&mut *self.caches.write(), fresh);
        info!(
            target: "mirror",
            dropped = old.entry_count(),
            "cleared reflection caches"
        );
    }
}

impl std::fmt::Debug for Reflector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reflector")
            .field("universe", &self.universe)
            .field("config", &self.config)
            .field("entries", &self.cached_entries())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_types::{FieldDefinition, Module, Primitive, TypeBuilder};

    fn reflector() -> Reflector {
        let point = TypeBuilder::class("geometry", "geometry.Point")
            .field(FieldDefinition::new("X", Primitive::I32))
            .field(FieldDefinition::new("Y", Primitive::I32))
            .build();
        let universe = Universe::new();
        universe
            .register_module(Module::new("geometry").with_type(point))
            .unwrap();
        Reflector::new(Arc::new(universe))
    }

    #[test]
    fn test_clear_swaps_generation() {
        let reflector = reflector();
        let point = reflector.resolve_type("geometry.Point").unwrap();
        reflector.compile_getter::<i32>(&point, "X").unwrap();
        assert!(reflector.cached_entries() >= 3);

        let before = reflector.caches();
        reflector.clear_all_caches();
        let after = reflector.caches();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(reflector.cached_entries(), 0);
        assert_eq!(reflector.stats(), CacheStats::default());
        // The old generation is intact for anyone still holding it
        assert!(before.entry_count() >= 3);
    }

    #[test]
    fn test_create_instance_by_name() {
        let reflector = reflector();
        let obj = reflector
            .create_instance_by_name("geometry.Point", &[])
            .unwrap();
        assert_eq!(
            reflector
                .get_value::<i32>(obj.as_object().unwrap(), "Y")
                .unwrap(),
            0
        );
        assert!(reflector
            .create_instance_by_name("geometry.Nowhere", &[])
            .unwrap_err()
            .is_invalid_argument());
    }
}
