//! Loaded modules and live introspection
//!
//! The `Universe` is the host runtime's view of every loaded type. Its
//! `query_*` methods are the live introspection facility: each call walks
//! type descriptors and increments [`IntrospectionStats`], so callers that
//! memoize these queries can prove they did not repeat one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::builder::TypeBuilder;
use crate::error::{HostError, HostResult};
use crate::flags::BindingFlags;
use crate::ty::{
    ConstructorHandle, FieldHandle, MethodHandle, Primitive, PropertyHandle, TypeDef, TypeHandle,
    TypeId,
};
use crate::value::Value;

/// Name of the module holding the primitive types
pub const CORE_MODULE: &str = "core";

/// A named scope of types
#[derive(Debug)]
pub struct Module {
    name: String,
    types: FxHashMap<String, TypeHandle>,
    order: Vec<TypeHandle>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// Add a type, replacing any type with the same name
    pub fn add_type(&mut self, ty: TypeHandle) {
        if let Some(old) = self.types.insert(ty.name().to_string(), ty.clone()) {
            self.order.retain(|t| t.id() != old.id());
        }
        self.order.push(ty);
    }

    /// Builder-style `add_type`
    pub fn with_type(mut self, ty: TypeHandle) -> Self {
        self.add_type(ty);
        self
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Find a type by exact full name
    pub fn get(&self, name: &str) -> Option<&TypeHandle> {
        self.types.get(name)
    }

    /// Types in registration order
    pub fn types(&self) -> &[TypeHandle] {
        &self.order
    }

    /// Number of types
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if module is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Counters for live introspection queries.
///
/// All counters use `Ordering::Relaxed`; they are independent tallies.
#[derive(Debug, Default)]
pub struct IntrospectionStats {
    type_queries: AtomicU64,
    member_queries: AtomicU64,
}

impl IntrospectionStats {
    /// Number of live type-by-name queries
    pub fn type_queries(&self) -> u64 {
        self.type_queries.load(Ordering::Relaxed)
    }

    /// Number of live member queries
    pub fn member_queries(&self) -> u64 {
        self.member_queries.load(Ordering::Relaxed)
    }

    /// Total number of live queries
    pub fn total(&self) -> u64 {
        self.type_queries() + self.member_queries()
    }

    #[inline]
    fn record_type_query(&self) {
        self.type_queries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_member_query(&self) {
        self.member_queries.fetch_add(1, Ordering::Relaxed);
    }
}

/// The set of loaded modules, in registration order
pub struct Universe {
    modules: RwLock<Vec<Arc<Module>>>,
    by_id: RwLock<FxHashMap<TypeId, TypeHandle>>,
    primary: RwLock<String>,
    primitives: Vec<TypeHandle>,
    stats: IntrospectionStats,
}

impl Universe {
    /// Create a universe holding only the `core` module.
    ///
    /// `core` is the initial primary scope.
    pub fn new() -> Self {
        let mut core = Module::new(CORE_MODULE);
        let mut primitives = Vec::with_capacity(Primitive::ALL.len());
        let mut by_id = FxHashMap::default();
        for p in Primitive::ALL {
            let ty = TypeBuilder::primitive(CORE_MODULE, p).build();
            by_id.insert(ty.id(), ty.clone());
            primitives.push(ty.clone());
            core.add_type(ty);
        }
        Self {
            modules: RwLock::new(vec![Arc::new(core)]),
            by_id: RwLock::new(by_id),
            primary: RwLock::new(CORE_MODULE.to_string()),
            primitives,
            stats: IntrospectionStats::default(),
        }
    }

    /// Load a module. Module names must be unique.
    pub fn register_module(&self, module: Module) -> HostResult<Arc<Module>> {
        let mut modules = self.modules.write();
        if modules.iter().any(|m| m.name() == module.name()) {
            return Err(HostError::DuplicateModule(module.name().to_string()));
        }
        let module = Arc::new(module);
        {
            let mut by_id = self.by_id.write();
            for ty in module.types() {
                by_id.insert(ty.id(), ty.clone());
            }
        }
        modules.push(module.clone());
        Ok(module)
    }

    /// Choose the module searched first by name resolution
    pub fn set_primary(&self, name: impl Into<String>) {
        *self.primary.write() = name.into();
    }

    /// Name of the primary module
    pub fn primary_name(&self) -> String {
        self.primary.read().clone()
    }

    /// Look up a loaded module by name
    pub fn module(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.read().iter().find(|m| m.name() == name).cloned()
    }

    /// Loaded modules in registration order
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.modules.read().clone()
    }

    /// Every loaded type, module by module
    pub fn all_types(&self) -> Vec<TypeHandle> {
        self.modules
            .read()
            .iter()
            .flat_map(|m| m.types().iter().cloned())
            .collect()
    }

    /// Type descriptor of a primitive
    pub fn primitive(&self, p: Primitive) -> TypeHandle {
        self.primitives[p as usize].clone()
    }

    /// Type by identity
    pub fn type_by_id(&self, id: TypeId) -> Option<TypeHandle> {
        self.by_id.read().get(&id).cloned()
    }

    /// Runtime type of a value, `None` for null
    pub fn type_of(&self, value: &Value) -> Option<TypeHandle> {
        match value {
            Value::Object(obj) => Some(obj.type_handle().clone()),
            other => other
                .kind()
                .and_then(Primitive::of_kind)
                .map(|p| self.primitive(p)),
        }
    }

    /// Whether `sub` is `ancestor` or derives from it
    pub fn is_subclass_of(&self, sub: &TypeDef, ancestor: TypeId) -> bool {
        sub.is_subclass_of(ancestor)
    }

    /// Introspection counters
    pub fn stats(&self) -> &IntrospectionStats {
        &self.stats
    }

    // ========================================================================
    // Live introspection queries
    // ========================================================================

    /// Find a type by exact name within one module
    pub fn query_type(&self, module: &Module, name: &str) -> Option<TypeHandle> {
        self.stats.record_type_query();
        module.get(name).cloned()
    }

    /// Find a field visible under `flags`
    pub fn query_field(&self, ty: &TypeDef, name: &str, flags: BindingFlags) -> Option<FieldHandle> {
        self.stats.record_member_query();
        search(ty, flags, |t, inherited| {
            t.fields()
                .iter()
                .find(|f| {
                    f.name() == name && flags.admits(f.visibility(), f.is_static(), inherited)
                })
                .cloned()
        })
    }

    /// Find a property visible under `flags`
    pub fn query_property(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
    ) -> Option<PropertyHandle> {
        self.stats.record_member_query();
        search(ty, flags, |t, inherited| {
            t.properties()
                .iter()
                .find(|p| {
                    p.name() == name && flags.admits(p.visibility(), p.is_static(), inherited)
                })
                .cloned()
        })
    }

    /// Find a method visible under `flags`.
    ///
    /// With a signature the parameter types must match exactly; without one
    /// the first method with the name wins, in declaration order with the
    /// searched type's own methods before its base types'.
    pub fn query_method(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
        signature: Option<&[TypeId]>,
    ) -> Option<MethodHandle> {
        self.stats.record_member_query();
        search(ty, flags, |t, inherited| {
            t.methods()
                .iter()
                .find(|m| {
                    m.name() == name
                        && flags.admits(m.visibility(), m.is_static(), inherited)
                        && signature.map_or(true, |sig| m.has_signature(sig))
                })
                .cloned()
        })
    }

    /// Every method with the name visible under `flags`, in declaration order
    pub fn query_methods_named(
        &self,
        ty: &TypeDef,
        name: &str,
        flags: BindingFlags,
    ) -> Vec<MethodHandle> {
        self.stats.record_member_query();
        let mut found = Vec::new();
        for (depth, t) in ty.hierarchy().enumerate() {
            if depth > 0 && flags.contains(BindingFlags::DECLARED_ONLY) {
                break;
            }
            found.extend(
                t.methods()
                    .iter()
                    .filter(|m| {
                        m.name() == name && flags.admits(m.visibility(), m.is_static(), depth > 0)
                    })
                    .cloned(),
            );
        }
        found
    }

    /// Find a constructor declared on `ty` itself.
    ///
    /// Constructors are not inherited.
    pub fn query_constructor(
        &self,
        ty: &TypeDef,
        flags: BindingFlags,
        signature: Option<&[TypeId]>,
    ) -> Option<ConstructorHandle> {
        self.stats.record_member_query();
        ty.constructors()
            .iter()
            .find(|c| {
                flags.admits(c.visibility(), false, false)
                    && signature.map_or(true, |sig| c.has_signature(sig))
            })
            .cloned()
    }

    /// Every constructor of `ty` visible under `flags`, in declaration order
    pub fn query_constructors(&self, ty: &TypeDef, flags: BindingFlags) -> Vec<ConstructorHandle> {
        self.stats.record_member_query();
        ty.constructors()
            .iter()
            .filter(|c| flags.admits(c.visibility(), false, false))
            .cloned()
            .collect()
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Universe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .modules
            .read()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        f.debug_struct("Universe")
            .field("modules", &names)
            .field("primary", &*self.primary.read())
            .finish()
    }
}

/// Walk the hierarchy nearest-first, honouring `DECLARED_ONLY`
fn search<T>(
    ty: &TypeDef,
    flags: BindingFlags,
    mut find: impl FnMut(&TypeDef, bool) -> Option<T>,
) -> Option<T> {
    for (depth, t) in ty.hierarchy().enumerate() {
        if depth > 0 && flags.contains(BindingFlags::DECLARED_ONLY) {
            break;
        }
        if let Some(found) = find(t, depth > 0) {
            return Some(found);
        }
    }
    None
}
