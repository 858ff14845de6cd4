//! Compiled getters and setters
//!
//! A getter or setter is compiled once per (target type, member name,
//! Rust value type). Compilation resolves the member through the
//! [`MemberMetadataCache`], checks that the declared member type converts to
//! the requested Rust type, and captures the resolved storage and the planned
//! [`Conversion`] in a closure. Calling the closure performs no lookup.
//!
//! Properties take precedence over fields of the same name. A property is
//! only used if it is readable (for getters) or writable (for setters) and
//! its type converts; otherwise the field is tried.

use std::any::{Any, TypeId as RustTypeId};
use std::sync::Arc;

use dashmap::DashMap;
use mirror_types::{
    is_assignable, BindingFlags, Conversion, FieldDef, FieldStorage, HostError, ObjectRef,
    Reflected, TypeDef, TypeRef, Value, ValueKind,
};
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace};

use crate::error::{require_name, ReflectError, ReflectResult};
use crate::key::AccessorKey;
use crate::members::MemberMetadataCache;
use crate::stats::{CacheCounter, CacheStat};

/// Compiled read of a member as `R`. Receives the instance, ignored for
/// static members.
pub type Getter<R> = Arc<dyn Fn(&Value) -> ReflectResult<R> + Send + Sync>;

/// Compiled write of a `V` into a member
pub type Setter<V> = Arc<dyn Fn(&Value, V) -> ReflectResult<()> + Send + Sync>;

type ErasedAccessor = Arc<dyn Any + Send + Sync>;

/// Builds and caches [`Getter`]s and [`Setter`]s
pub struct AccessorCompiler {
    members: Arc<MemberMetadataCache>,
    flags: BindingFlags,
    getters: DashMap<AccessorKey, ErasedAccessor, FxBuildHasher>,
    setters: DashMap<AccessorKey, ErasedAccessor, FxBuildHasher>,
    getter_counter: CacheCounter,
    setter_counter: CacheCounter,
}

impl AccessorCompiler {
    /// Create a compiler resolving members under `flags`
    pub fn new(members: Arc<MemberMetadataCache>, flags: BindingFlags, collect_stats: bool) -> Self {
        Self {
            members,
            flags,
            getters: DashMap::with_hasher(FxBuildHasher),
            setters: DashMap::with_hasher(FxBuildHasher),
            getter_counter: CacheCounter::new(collect_stats),
            setter_counter: CacheCounter::new(collect_stats),
        }
    }

    /// Compile a getter reading `name` on `ty` as `R`.
    ///
    /// Repeated calls with the same type, name and `R` return the same
    /// closure.
    pub fn compile_getter<R: Reflected>(&self, ty: &TypeDef, name: &str) -> ReflectResult<Getter<R>> {
        require_name(name, "member")?;
        let key = AccessorKey {
            owner: ty.id(),
            name: Arc::from(name),
            value_type: RustTypeId::of::<R>(),
        };

        let cached = self
            .getters
            .get(&key)
            .and_then(|entry| entry.downcast_ref::<Getter<R>>().cloned());
        if let Some(getter) = cached {
            self.getter_counter.hit();
            trace!(target: "mirror::accessors", type_name = ty.name(), member = name, cache_hit = true);
            return Ok(getter);
        }

        self.getter_counter.miss();
        let getter = self.build_getter::<R>(ty, name)?;
        debug!(
            target: "mirror::accessors",
            type_name = ty.name(),
            member = name,
            result = std::any::type_name::<R>(),
            "compiled getter"
        );
        let stored = self
            .getters
            .entry(key)
            .or_insert(Arc::new(getter))
            .value()
            .clone();
        stored
            .downcast_ref::<Getter<R>>()
            .cloned()
            .ok_or_else(|| ReflectError::invalid("getter cache entry has an unexpected shape"))
    }

    /// Compile a setter writing a `V` into `name` on `ty`.
    ///
    /// Repeated calls with the same type, name and `V` return the same
    /// closure.
    pub fn compile_setter<V: Reflected>(&self, ty: &TypeDef, name: &str) -> ReflectResult<Setter<V>> {
        require_name(name, "member")?;
        let key = AccessorKey {
            owner: ty.id(),
            name: Arc::from(name),
            value_type: RustTypeId::of::<V>(),
        };

        let cached = self
            .setters
            .get(&key)
            .and_then(|entry| entry.downcast_ref::<Setter<V>>().cloned());
        if let Some(setter) = cached {
            self.setter_counter.hit();
            trace!(target: "mirror::accessors", type_name = ty.name(), member = name, cache_hit = true);
            return Ok(setter);
        }

        self.setter_counter.miss();
        let setter = self.build_setter::<V>(ty, name)?;
        debug!(
            target: "mirror::accessors",
            type_name = ty.name(),
            member = name,
            value = std::any::type_name::<V>(),
            "compiled setter"
        );
        let stored = self
            .setters
            .entry(key)
            .or_insert(Arc::new(setter))
            .value()
            .clone();
        stored
            .downcast_ref::<Setter<V>>()
            .cloned()
            .ok_or_else(|| ReflectError::invalid("setter cache entry has an unexpected shape"))
    }

    /// Read `name` from an instance through the compiled getter for its
    /// runtime type
    pub fn get_value<R: Reflected>(&self, instance: &ObjectRef, name: &str) -> ReflectResult<R> {
        let getter = self.compile_getter::<R>(instance.type_handle(), name)?;
        getter(&Value::Object(instance.clone()))
    }

    /// Write `name` on an instance through the compiled setter for its
    /// runtime type
    pub fn set_value<V: Reflected>(&self, instance: &ObjectRef, name: &str, value: V) -> ReflectResult<()> {
        let setter = self.compile_setter::<V>(instance.type_handle(), name)?;
        setter(&Value::Object(instance.clone()), value)
    }

    fn build_getter<R: Reflected>(&self, ty: &TypeDef, name: &str) -> ReflectResult<Getter<R>> {
        let target_type = ty.type_ref();

        if let Some(property) = self.members.resolve_property(ty, name, self.flags)? {
            let plan = Conversion::plan(property.property_type().kind(), R::KIND);
            if let (Some(body), Some(conversion)) = (property.getter().cloned(), plan) {
                let is_static = property.is_static();
                return Ok(Arc::new(move |target: &Value| -> ReflectResult<R> {
                    let raw = if is_static {
                        body(&Value::Null)?
                    } else {
                        instance_of(target, &target_type)?;
                        body(target)?
                    };
                    convert_for_read(conversion, raw)
                }));
            }
        }

        if let Some(field) = self.members.resolve_field(ty, name, self.flags)? {
            if let Some(conversion) = Conversion::plan(field.field_type().kind(), R::KIND) {
                return Ok(Arc::new(move |target: &Value| -> ReflectResult<R> {
                    let raw = read_field(&field, target, &target_type)?;
                    convert_for_read(conversion, raw)
                }));
            }
        }

        Err(ReflectError::invalid(format!(
            "member not found, or type mismatch: no readable {}.{} convertible to {}",
            ty.name(),
            name,
            R::KIND
        )))
    }

    fn build_setter<V: Reflected>(&self, ty: &TypeDef, name: &str) -> ReflectResult<Setter<V>> {
        let target_type = ty.type_ref();

        if let Some(property) = self.members.resolve_property(ty, name, self.flags)? {
            let plan = Conversion::plan(V::KIND, property.property_type().kind());
            if let (Some(body), Some(conversion)) = (property.setter().cloned(), plan) {
                let is_static = property.is_static();
                let declared = property.property_type().clone();
                return Ok(Arc::new(move |target: &Value, value: V| -> ReflectResult<()> {
                    let converted = convert_for_store(conversion, value, &declared)?;
                    if is_static {
                        body(&Value::Null, converted)?;
                    } else {
                        instance_of(target, &target_type)?;
                        body(target, converted)?;
                    }
                    Ok(())
                }));
            }
        }

        if let Some(field) = self.members.resolve_field(ty, name, self.flags)? {
            let plan = Conversion::plan(V::KIND, field.field_type().kind());
            if let (false, Some(conversion)) = (field.is_readonly(), plan) {
                return Ok(Arc::new(move |target: &Value, value: V| -> ReflectResult<()> {
                    let converted = convert_for_store(conversion, value, field.field_type())?;
                    write_field(&field, target, &target_type, converted)
                }));
            }
        }

        Err(ReflectError::invalid(format!(
            "member not found, or type mismatch: no writable {}.{} accepting {}",
            ty.name(),
            name,
            V::KIND
        )))
    }

    /// Number of compiled getters and setters
    pub fn len(&self) -> usize {
        self.getters.len() + self.setters.len()
    }

    /// Check if nothing has been compiled
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Getter cache statistics
    pub fn getter_stats(&self) -> CacheStat {
        self.getter_counter.snapshot(self.getters.len())
    }

    /// Setter cache statistics
    pub fn setter_stats(&self) -> CacheStat {
        self.setter_counter.snapshot(self.setters.len())
    }
}

/// The target as an instance of `ty`
fn instance_of<'a>(target: &'a Value, ty: &TypeRef) -> ReflectResult<&'a ObjectRef> {
    match target {
        Value::Object(obj) if obj.type_handle().is_subclass_of(ty.id()) => Ok(obj),
        Value::Null => Err(ReflectError::invalid(format!(
            "instance member of {ty} requires a target"
        ))),
        other => Err(ReflectError::invalid(format!(
            "target of type {} is not an instance of {ty}",
            other.type_name()
        ))),
    }
}

fn read_field(field: &FieldDef, target: &Value, owner: &TypeRef) -> ReflectResult<Value> {
    match field.storage() {
        FieldStorage::Static(cell) => Ok(cell.read().clone()),
        FieldStorage::Instance(slot) => {
            let obj = instance_of(target, owner)?;
            obj.slot(*slot).ok_or_else(|| {
                ReflectError::invalid(format!("{} has no slot {slot}", obj.type_handle().name()))
            })
        }
    }
}

fn write_field(field: &FieldDef, target: &Value, owner: &TypeRef, value: Value) -> ReflectResult<()> {
    match field.storage() {
        FieldStorage::Static(cell) => {
            *cell.write() = value;
            Ok(())
        }
        FieldStorage::Instance(slot) => {
            let obj = instance_of(target, owner)?;
            if obj.set_slot(*slot, value) {
                Ok(())
            } else {
                Err(ReflectError::invalid(format!(
                    "{} has no slot {slot}",
                    obj.type_handle().name()
                )))
            }
        }
    }
}

/// Null skips the planned conversion and is left to `R` to accept or reject
fn convert_for_read<R: Reflected>(conversion: Conversion, raw: Value) -> ReflectResult<R> {
    let value = if raw.is_null() { raw } else { conversion.apply(raw)? };
    Ok(R::from_value(value)?)
}

/// Apply the planned conversion; class-typed members also need the value's
/// runtime type to fit
fn convert_for_store<V: Reflected>(
    conversion: Conversion,
    value: V,
    declared: &TypeRef,
) -> ReflectResult<Value> {
    let value = value.into_value();
    if value.is_null() {
        if declared.kind().is_reference() {
            return Ok(value);
        }
        return Err(HostError::TypeMismatch {
            expected: declared.name().to_string(),
            got: value.type_name(),
        }
        .into());
    }
    let converted = conversion.apply(value)?;
    if declared.kind() == ValueKind::Object && !is_assignable(&converted, declared) {
        return Err(HostError::TypeMismatch {
            expected: declared.name().to_string(),
            got: converted.type_name(),
        }
        .into());
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_types::{
        FieldDefinition, Module, Object, Primitive, PropertyDefinition, TypeBuilder, TypeHandle,
        Universe,
    };

    fn point() -> (AccessorCompiler, TypeHandle) {
        let point = TypeBuilder::class("geometry", "geometry.Point")
            .field(FieldDefinition::new("X", Primitive::I32))
            .field(FieldDefinition::new("Y", Primitive::I32))
            .field(FieldDefinition::new("Origin", Primitive::String).as_static().as_readonly())
            .property(
                PropertyDefinition::new("Sum", Primitive::I64).getter(|this| {
                    let obj = this.as_object().ok_or("not a point")?;
                    let x = obj.slot(0).and_then(|v| v.as_i32()).unwrap_or_default();
                    let y = obj.slot(1).and_then(|v| v.as_i32()).unwrap_or_default();
                    Ok(Value::I64(x as i64 + y as i64))
                }),
            )
            .build();
        let universe = Universe::new();
        universe
            .register_module(Module::new("geometry").with_type(point.clone()))
            .unwrap();
        let members = Arc::new(MemberMetadataCache::new(Arc::new(universe), true));
        (AccessorCompiler::new(members, BindingFlags::ALL, true), point)
    }

    #[test]
    fn test_getter_reads_field() {
        let (compiler, point) = point();
        let obj = Object::alloc(&point);
        obj.set_slot(0, Value::I32(5));
        let getter = compiler.compile_getter::<i32>(&point, "X").unwrap();
        assert_eq!(getter(&Value::Object(obj)).unwrap(), 5);
    }

    #[test]
    fn test_getter_is_cached_per_result_type() {
        let (compiler, point) = point();
        let a = compiler.compile_getter::<i32>(&point, "X").unwrap();
        let b = compiler.compile_getter::<i32>(&point, "X").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let widened = compiler.compile_getter::<i64>(&point, "X").unwrap();
        let obj = Object::alloc(&point);
        obj.set_slot(0, Value::I32(i32::MIN));
        assert_eq!(widened(&Value::Object(obj)).unwrap(), i32::MIN as i64);
        assert_eq!(compiler.getter_stats().size, 2);
        assert_eq!(compiler.getter_stats().hits, 1);
    }

    #[test]
    fn test_illegal_conversion_rejected_at_compile_time() {
        let (compiler, point) = point();
        let err = compiler.compile_getter::<String>(&point, "X").err().unwrap();
        assert!(err.is_invalid_argument());
        let err = compiler.compile_setter::<bool>(&point, "Y").err().unwrap();
        assert!(err.is_invalid_argument());
        assert!(compiler.is_empty());
    }

    #[test]
    fn test_property_getter() {
        let (compiler, point) = point();
        let obj = Object::alloc(&point);
        obj.set_slot(0, Value::I32(2));
        obj.set_slot(1, Value::I32(3));
        let sum = compiler.compile_getter::<i64>(&point, "Sum").unwrap();
        assert_eq!(sum(&Value::Object(obj)).unwrap(), 5);
        // Read-only property cannot back a setter
        assert!(compiler.compile_setter::<i64>(&point, "Sum").is_err());
    }

    #[test]
    fn test_readonly_static_field() {
        let (compiler, point) = point();
        let origin = compiler.compile_getter::<Value>(&point, "Origin").unwrap();
        assert_eq!(origin(&Value::Null).unwrap(), Value::Null);
        assert!(compiler.compile_setter::<String>(&point, "Origin").is_err());
    }

    #[test]
    fn test_wrong_target() {
        let (compiler, point) = point();
        let getter = compiler.compile_getter::<i32>(&point, "X").unwrap();
        assert!(getter(&Value::Null).unwrap_err().is_invalid_argument());
        assert!(getter(&Value::I32(1)).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_boxed_setter_checks_value() {
        let (compiler, point) = point();
        let obj = Object::alloc(&point);
        let setter = compiler.compile_setter::<Value>(&point, "X").unwrap();
        setter(&Value::Object(obj.clone()), Value::I32(9)).unwrap();
        assert_eq!(obj.slot(0), Some(Value::I32(9)));
        let err = setter(&Value::Object(obj), Value::str("nine")).unwrap_err();
        assert!(matches!(err, ReflectError::Target(HostError::InvalidCast { .. })));
    }
}
