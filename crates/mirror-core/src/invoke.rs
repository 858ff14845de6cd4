//! Method invocation, construction and bound invokers
//!
//! Overload selection runs in two steps. First the runtime types of the
//! arguments form an exact signature, resolved through the
//! [`MemberMetadataCache`]. If that fails, candidates with the right arity
//! are tried in declaration order and the first one whose parameters all
//! accept their argument (null for reference types, assignable, or a
//! successful [`coerce`]) is called. Ties are not ranked.
//!
//! No-argument construction goes through a cached [`Factory`] per type.
//! Construction with arguments always scans the constructors again.

use std::any::{Any, TypeId as RustTypeId};
use std::sync::Arc;

use dashmap::DashMap;
use mirror_types::{
    coerce, is_assignable, BindingFlags, ConstructorDef, Conversion, MethodHandle, Object,
    ObjectRef, ParameterDef, Primitive, TypeHandle, TypeId, TypeRef, Value, ValueKind,
};
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace};

use crate::delegate::{DelegateShape, Invocation, ReturnShape};
use crate::error::{require_name, ReflectError, ReflectResult};
use crate::key::{Binding, InvokerKey, Signature};
use crate::members::MemberMetadataCache;
use crate::stats::{CacheCounter, CacheStat};

/// Cached no-argument constructor
pub type Factory = Arc<dyn Fn() -> ReflectResult<Value> + Send + Sync>;

type ErasedDelegate = Arc<dyn Any + Send + Sync>;

/// Target of a call: an instance, or a type for static members
#[derive(Debug, Clone)]
pub enum Receiver {
    /// Instance members of this object
    Instance(ObjectRef),
    /// Static members of this type
    Static(TypeHandle),
}

impl Receiver {
    /// Type whose members are searched
    pub fn type_handle(&self) -> &TypeHandle {
        match self {
            Receiver::Instance(obj) => obj.type_handle(),
            Receiver::Static(ty) => ty,
        }
    }

    /// Cache binding of this receiver
    pub fn binding(&self) -> Binding {
        match self {
            Receiver::Instance(obj) => Binding::Instance(obj.id()),
            Receiver::Static(_) => Binding::Static,
        }
    }

    /// Value passed as `this`
    pub fn this_value(&self) -> Value {
        match self {
            Receiver::Instance(obj) => Value::Object(obj.clone()),
            Receiver::Static(_) => Value::Null,
        }
    }

    /// Add `INSTANCE` or `STATIC` to `visibility`
    fn lookup_flags(&self, visibility: BindingFlags) -> BindingFlags {
        let visibility = visibility.difference(BindingFlags::INSTANCE | BindingFlags::STATIC);
        match self {
            Receiver::Instance(_) => visibility | BindingFlags::INSTANCE,
            Receiver::Static(_) => visibility | BindingFlags::STATIC,
        }
    }
}

impl From<ObjectRef> for Receiver {
    fn from(obj: ObjectRef) -> Self {
        Receiver::Instance(obj)
    }
}

impl From<&ObjectRef> for Receiver {
    fn from(obj: &ObjectRef) -> Self {
        Receiver::Instance(obj.clone())
    }
}

/// Invokes methods and constructors by name with dynamic arguments
pub struct InvocationDispatcher {
    members: Arc<MemberMetadataCache>,
    invoke_flags: BindingFlags,
    constructor_flags: BindingFlags,
    factories: DashMap<TypeId, Factory, FxBuildHasher>,
    invokers: DashMap<InvokerKey, ErasedDelegate, FxBuildHasher>,
    factory_counter: CacheCounter,
    invoker_counter: CacheCounter,
}

impl InvocationDispatcher {
    /// Create a dispatcher.
    ///
    /// `invoke_flags` supplies the visibility for method lookups; the
    /// receiver decides between instance and static members.
    pub fn new(
        members: Arc<MemberMetadataCache>,
        invoke_flags: BindingFlags,
        constructor_flags: BindingFlags,
        collect_stats: bool,
    ) -> Self {
        Self {
            members,
            invoke_flags,
            constructor_flags,
            factories: DashMap::with_hasher(FxBuildHasher),
            invokers: DashMap::with_hasher(FxBuildHasher),
            factory_counter: CacheCounter::new(collect_stats),
            invoker_counter: CacheCounter::new(collect_stats),
        }
    }

    /// Call the method `name` on `receiver`.
    ///
    /// Errors raised by the method body are returned as
    /// [`ReflectError::Target`] holding the body's own error.
    pub fn invoke(&self, receiver: &Receiver, name: &str, args: &[Value]) -> ReflectResult<Value> {
        require_name(name, "method")?;
        let ty = receiver.type_handle();
        let flags = receiver.lookup_flags(self.invoke_flags);
        let this = receiver.this_value();

        if let Some(signature) = exact_signature(args) {
            if let Some(method) = self.members.resolve_method(ty, name, flags, signature)? {
                trace!(target: "mirror::invoke", type_name = ty.name(), method = name, exact = true);
                return Ok(method.call(&this, args)?);
            }
        }

        debug!(
            target: "mirror::invoke",
            type_name = ty.name(),
            method = name,
            arity = args.len(),
            "no exact overload, scanning for a compatible one"
        );
        let overloads = self.members.resolve_overloads(ty, name, flags)?;
        for method in overloads.iter() {
            if let Some(converted) = coerce_arguments(method.parameters(), args) {
                return Ok(method.call(&this, &converted)?);
            }
        }

        Err(ReflectError::invalid(format!(
            "no matching method {}.{}({})",
            ty.name(),
            name,
            describe(args)
        )))
    }

    /// Create an instance of `ty`.
    ///
    /// Without arguments the cached factory is used. Primitive types yield
    /// their default value.
    pub fn create_instance(&self, ty: &TypeHandle, args: &[Value]) -> ReflectResult<Value> {
        if args.is_empty() {
            let factory = self.compile_factory(ty)?;
            return factory();
        }

        if !ty.is_class() {
            return Err(ReflectError::invalid(format!(
                "{} has no constructor taking arguments",
                ty.name()
            )));
        }

        if let Some(signature) = exact_signature(args) {
            if let Some(ctor) =
                self.members
                    .resolve_constructor(ty, self.constructor_flags, signature)
            {
                return construct(ty, &ctor, args);
            }
        }

        debug!(
            target: "mirror::invoke",
            type_name = ty.name(),
            arity = args.len(),
            "no exact constructor, scanning for a compatible one"
        );
        let universe = self.members.universe();
        for ctor in universe.query_constructors(ty, self.constructor_flags) {
            if let Some(converted) = coerce_arguments(ctor.parameters(), args) {
                return construct(ty, &ctor, &converted);
            }
        }

        Err(ReflectError::invalid(format!(
            "no matching constructor {}({})",
            ty.name(),
            describe(args)
        )))
    }

    /// The cached no-argument factory of `ty`
    pub fn compile_factory(&self, ty: &TypeHandle) -> ReflectResult<Factory> {
        if let Some(factory) = self.factories.get(&ty.id()) {
            self.factory_counter.hit();
            trace!(target: "mirror::invoke", type_name = ty.name(), cache_hit = true);
            return Ok(factory.value().clone());
        }

        self.factory_counter.miss();
        let factory: Factory = if ty.is_class() {
            let ctor = self
                .members
                .resolve_constructor(ty, self.constructor_flags, Signature::empty())
                .ok_or_else(|| {
                    ReflectError::invalid(format!("{} has no parameterless constructor", ty.name()))
                })?;
            let ty = ty.clone();
            Arc::new(move || construct(&ty, &ctor, &[]))
        } else {
            let kind = ty.kind();
            Arc::new(move || Ok(Value::default_for(kind)))
        };
        debug!(target: "mirror::invoke", type_name = ty.name(), "compiled factory");

        Ok(self
            .factories
            .entry(ty.id())
            .or_insert(factory)
            .value()
            .clone())
    }

    /// Bind the method `name` of `receiver` to the delegate shape `S`.
    ///
    /// The first overload, in declaration order, whose parameters and return
    /// type convert to and from the shape is bound. Bindings are cached per
    /// receiver type, name, shape and instance; static and instance
    /// bindings never share an entry.
    pub fn create_bound_invoker<S: DelegateShape>(
        &self,
        receiver: &Receiver,
        name: &str,
    ) -> ReflectResult<S::Delegate> {
        require_name(name, "method")?;
        let ty = receiver.type_handle();
        let key = InvokerKey {
            owner: ty.id(),
            name: Arc::from(name),
            shape: RustTypeId::of::<S>(),
            binding: receiver.binding(),
        };

        let cached = self
            .invokers
            .get(&key)
            .and_then(|entry| entry.downcast_ref::<S::Delegate>().cloned());
        if let Some(delegate) = cached {
            self.invoker_counter.hit();
            trace!(target: "mirror::invoke", type_name = ty.name(), method = name, cache_hit = true);
            return Ok(delegate);
        }

        self.invoker_counter.miss();
        let flags = receiver.lookup_flags(self.invoke_flags);
        let overloads = self.members.resolve_overloads(ty, name, flags)?;
        let parameters = S::parameters();
        let returns = S::returns();

        let (method, argument_plan, return_plan) = overloads
            .iter()
            .find_map(|m| plan_binding(m, parameters.as_deref(), returns))
            .ok_or_else(|| {
                ReflectError::invalid(format!(
                    "no overload of {}.{} matches delegate {}",
                    ty.name(),
                    name,
                    std::any::type_name::<S>()
                ))
            })?;

        let this = receiver.this_value();
        let invocation: Invocation = Arc::new(move |args: Vec<Value>| -> ReflectResult<Value> {
            let args = match &argument_plan {
                Some(plans) => plans
                    .iter()
                    .zip(args)
                    .map(|((conversion, declared), arg)| convert_argument(*conversion, declared, arg))
                    .collect::<ReflectResult<Vec<_>>>()?,
                None => coerce_arguments(method.parameters(), &args).ok_or_else(|| {
                    ReflectError::invalid(format!(
                        "arguments ({}) do not match {}",
                        describe(&args),
                        method.name()
                    ))
                })?,
            };
            let result = method.call(&this, &args)?;
            match return_plan {
                Some(conversion) if !result.is_null() => Ok(conversion.apply(result)?),
                _ => Ok(result),
            }
        });
        debug!(
            target: "mirror::invoke",
            type_name = ty.name(),
            method = name,
            shape = std::any::type_name::<S>(),
            "bound invoker"
        );

        let stored = self
            .invokers
            .entry(key)
            .or_insert(Arc::new(S::wrap(invocation)))
            .value()
            .clone();
        stored
            .downcast_ref::<S::Delegate>()
            .cloned()
            .ok_or_else(|| ReflectError::invalid("invoker cache entry has an unexpected shape"))
    }

    /// Number of cached factories and invokers
    pub fn len(&self) -> usize {
        self.factories.len() + self.invokers.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Factory cache statistics
    pub fn factory_stats(&self) -> CacheStat {
        self.factory_counter.snapshot(self.factories.len())
    }

    /// Bound invoker cache statistics
    pub fn invoker_stats(&self) -> CacheStat {
        self.invoker_counter.snapshot(self.invokers.len())
    }
}

type ArgumentPlan = Option<Vec<(Conversion, TypeRef)>>;

/// Plan the conversions binding `method` to a shape, `None` if it does not fit
fn plan_binding(
    method: &MethodHandle,
    parameters: Option<&[ValueKind]>,
    returns: ReturnShape,
) -> Option<(MethodHandle, ArgumentPlan, Option<Conversion>)> {
    let argument_plan = match parameters {
        None => None,
        Some(kinds) => {
            if kinds.len() != method.parameters().len() {
                return None;
            }
            let plans = kinds
                .iter()
                .zip(method.parameters())
                .map(|(kind, p)| Conversion::plan(*kind, p.ty.kind()).map(|c| (c, p.ty.clone())))
                .collect::<Option<Vec<_>>>()?;
            Some(plans)
        }
    };

    let return_plan = match (returns, method.return_type()) {
        (ReturnShape::Discard, _) => None,
        (ReturnShape::Value(ValueKind::Any), None) => None,
        (ReturnShape::Value(_), None) => return None,
        (ReturnShape::Value(kind), Some(declared)) => Some(Conversion::plan(declared.kind(), kind)?),
    };

    Some((method.clone(), argument_plan, return_plan))
}

fn convert_argument(conversion: Conversion, declared: &TypeRef, arg: Value) -> ReflectResult<Value> {
    if arg.is_null() {
        if declared.kind().is_reference() {
            return Ok(arg);
        }
        return Err(ReflectError::invalid(format!(
            "null is not assignable to {declared}"
        )));
    }
    let converted = conversion.apply(arg)?;
    if declared.kind() == ValueKind::Object && !is_assignable(&converted, declared) {
        return Err(ReflectError::invalid(format!(
            "argument of type {} is not assignable to {declared}",
            converted.type_name()
        )));
    }
    Ok(converted)
}

/// Runtime type ids of the arguments; `None` if any argument is null
fn exact_signature(args: &[Value]) -> Option<Signature> {
    args.iter()
        .map(runtime_type_id)
        .collect::<Option<Vec<_>>>()
        .map(Signature::Exact)
}

fn runtime_type_id(value: &Value) -> Option<TypeId> {
    match value {
        Value::Object(obj) => Some(obj.type_handle().id()),
        other => other
            .kind()
            .and_then(Primitive::of_kind)
            .map(Primitive::type_id),
    }
}

/// Convert every argument to its parameter type, `None` if any fails
fn coerce_arguments(params: &[ParameterDef], args: &[Value]) -> Option<Vec<Value>> {
    if params.len() != args.len() {
        return None;
    }
    params
        .iter()
        .zip(args)
        .map(|(p, arg)| coerce(arg, &p.ty))
        .collect()
}

/// Allocate an instance and run the constructor body on it
fn construct(ty: &TypeHandle, ctor: &ConstructorDef, args: &[Value]) -> ReflectResult<Value> {
    let obj = Object::alloc(ty);
    ctor.initialize(&obj, args)?;
    Ok(Value::Object(obj))
}

fn describe(args: &[Value]) -> String {
    args.iter()
        .map(Value::type_name)
        .collect::<Vec<_>>()
        .join(", ")
}
