//! Type and member descriptors
//!
//! Descriptors are immutable once built and shared through `Arc`. Two
//! handles describe the same type or member exactly when their ids are equal.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::HostResult;
use crate::flags::Visibility;
use crate::object::ObjectRef;
use crate::value::{Value, ValueKind};

/// Type identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

/// Ids below this value are reserved for the primitive types
const FIRST_USER_TYPE_ID: u32 = 64;

static NEXT_TYPE_ID: AtomicU32 = AtomicU32::new(FIRST_USER_TYPE_ID);

impl TypeId {
    /// Allocate a fresh id for a user type
    pub fn new() -> Self {
        TypeId(NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Default for TypeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in primitive types, present in every universe's `core` module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `object`, accepts any value
    Object,
    /// `bool`
    Bool,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `f64`
    F64,
    /// `string`
    String,
}

impl Primitive {
    /// All primitives in registration order
    pub const ALL: [Primitive; 6] = [
        Primitive::Object,
        Primitive::Bool,
        Primitive::I32,
        Primitive::I64,
        Primitive::F64,
        Primitive::String,
    ];

    /// Fixed type id, identical across universes
    pub fn type_id(self) -> TypeId {
        TypeId(self as u32 + 1)
    }

    /// Value kind stored by this type
    pub fn kind(self) -> ValueKind {
        match self {
            Primitive::Object => ValueKind::Any,
            Primitive::Bool => ValueKind::Bool,
            Primitive::I32 => ValueKind::I32,
            Primitive::I64 => ValueKind::I64,
            Primitive::F64 => ValueKind::F64,
            Primitive::String => ValueKind::Str,
        }
    }

    /// Type name
    pub fn name(self) -> &'static str {
        self.kind().type_name()
    }

    /// Primitive type of a runtime value kind
    pub fn of_kind(kind: ValueKind) -> Option<Primitive> {
        match kind {
            ValueKind::Any => Some(Primitive::Object),
            ValueKind::Bool => Some(Primitive::Bool),
            ValueKind::I32 => Some(Primitive::I32),
            ValueKind::I64 => Some(Primitive::I64),
            ValueKind::F64 => Some(Primitive::F64),
            ValueKind::Str => Some(Primitive::String),
            ValueKind::Object => None,
        }
    }
}

/// Lightweight reference to a declared type
///
/// Used for field types, parameter types and return types so that a type
/// may refer to itself before it is built.
#[derive(Debug, Clone)]
pub struct TypeRef {
    id: TypeId,
    kind: ValueKind,
    name: Arc<str>,
}

impl TypeRef {
    /// Create a reference
    pub fn new(id: TypeId, kind: ValueKind, name: impl AsRef<str>) -> Self {
        Self {
            id,
            kind,
            name: Arc::from(name.as_ref()),
        }
    }

    /// Referenced type id
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Kind of values stored by the type
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl From<Primitive> for TypeRef {
    fn from(p: Primitive) -> Self {
        TypeRef::new(p.type_id(), p.kind(), p.name())
    }
}

impl From<&TypeHandle> for TypeRef {
    fn from(ty: &TypeHandle) -> Self {
        ty.type_ref()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Member identity: declaring type plus declaration ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId {
    /// Declaring type
    pub owner: TypeId,
    /// Position among the declaring type's members
    pub ordinal: u32,
}

// ============================================================================
// Attributes
// ============================================================================

/// An annotation attached to a type or member
///
/// Any `'static + Send + Sync` Rust value can serve as an attribute; queries
/// select attributes by their Rust type.
#[derive(Clone)]
pub struct AttributeEntry {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    inherited: bool,
}

impl AttributeEntry {
    /// Wrap an attribute value, inherited by subclasses and overrides
    pub fn new<A: Any + Send + Sync>(attribute: A) -> Self {
        Self {
            value: Arc::new(attribute),
            type_name: std::any::type_name::<A>(),
            inherited: true,
        }
    }

    /// Do not propagate this attribute to subclasses or overrides
    pub fn not_inherited(mut self) -> Self {
        self.inherited = false;
        self
    }

    /// Rust type name of the attribute value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether inheritance-aware lookups see this attribute on derived members
    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// Whether the attribute value is an `A`
    pub fn is<A: Any + Send + Sync>(&self) -> bool {
        self.value.is::<A>()
    }

    /// Get the attribute value as an `A`
    pub fn downcast<A: Any + Send + Sync>(&self) -> Option<Arc<A>> {
        self.value.clone().downcast::<A>().ok()
    }
}

impl fmt::Debug for AttributeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeEntry")
            .field("type", &self.type_name)
            .field("inherited", &self.inherited)
            .finish()
    }
}

// ============================================================================
// Members
// ============================================================================

/// Read body of a property; receives the instance, or null for statics
pub type PropertyGetFn = Arc<dyn Fn(&Value) -> HostResult<Value> + Send + Sync>;
/// Write body of a property
pub type PropertySetFn = Arc<dyn Fn(&Value, Value) -> HostResult<()> + Send + Sync>;
/// Method body; receives `this` (null for statics) and the arguments
pub type MethodFn = Arc<dyn Fn(&Value, &[Value]) -> HostResult<Value> + Send + Sync>;
/// Constructor body; receives the freshly allocated instance
pub type ConstructorFn = Arc<dyn Fn(&ObjectRef, &[Value]) -> HostResult<()> + Send + Sync>;

/// Where a field's value lives
#[derive(Debug, Clone)]
pub enum FieldStorage {
    /// Slot index within each instance
    Instance(usize),
    /// Shared cell owned by the field
    Static(Arc<RwLock<Value>>),
}

/// Field descriptor
#[derive(Debug)]
pub struct FieldDef {
    pub(crate) id: MemberId,
    pub(crate) name: String,
    pub(crate) ty: TypeRef,
    pub(crate) declaring: TypeRef,
    pub(crate) visibility: Visibility,
    pub(crate) readonly: bool,
    pub(crate) storage: FieldStorage,
    pub(crate) attributes: Vec<AttributeEntry>,
}

/// Shared field descriptor
pub type FieldHandle = Arc<FieldDef>;

impl FieldDef {
    /// Member identity
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared field type
    pub fn field_type(&self) -> &TypeRef {
        &self.ty
    }

    /// Declaring type
    pub fn declaring_type(&self) -> &TypeRef {
        &self.declaring
    }

    /// Declared visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Whether the field is static
    pub fn is_static(&self) -> bool {
        matches!(self.storage, FieldStorage::Static(_))
    }

    /// Whether the field rejects writes
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Storage location
    pub fn storage(&self) -> &FieldStorage {
        &self.storage
    }

    /// Attributes declared on this field
    pub fn attributes(&self) -> &[AttributeEntry] {
        &self.attributes
    }
}

/// Property descriptor
pub struct PropertyDef {
    pub(crate) id: MemberId,
    pub(crate) name: String,
    pub(crate) ty: TypeRef,
    pub(crate) declaring: TypeRef,
    pub(crate) visibility: Visibility,
    pub(crate) is_static: bool,
    pub(crate) getter: Option<PropertyGetFn>,
    pub(crate) setter: Option<PropertySetFn>,
    pub(crate) attributes: Vec<AttributeEntry>,
}

/// Shared property descriptor
pub type PropertyHandle = Arc<PropertyDef>;

impl PropertyDef {
    /// Member identity
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared property type
    pub fn property_type(&self) -> &TypeRef {
        &self.ty
    }

    /// Declaring type
    pub fn declaring_type(&self) -> &TypeRef {
        &self.declaring
    }

    /// Declared visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Whether the property is static
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Read body, if readable
    pub fn getter(&self) -> Option<&PropertyGetFn> {
        self.getter.as_ref()
    }

    /// Write body, if writable
    pub fn setter(&self) -> Option<&PropertySetFn> {
        self.setter.as_ref()
    }

    /// Whether the property has a read body
    pub fn can_read(&self) -> bool {
        self.getter.is_some()
    }

    /// Whether the property has a write body
    pub fn can_write(&self) -> bool {
        self.setter.is_some()
    }

    /// Attributes declared on this property
    pub fn attributes(&self) -> &[AttributeEntry] {
        &self.attributes
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.ty.name())
            .field("readable", &self.can_read())
            .field("writable", &self.can_write())
            .finish()
    }
}

/// Parameter descriptor
#[derive(Debug, Clone)]
pub struct ParameterDef {
    /// Parameter name
    pub name: String,
    /// Declared parameter type
    pub ty: TypeRef,
}

/// Method descriptor
pub struct MethodDef {
    pub(crate) id: MemberId,
    pub(crate) name: String,
    pub(crate) params: Vec<ParameterDef>,
    pub(crate) return_type: Option<TypeRef>,
    pub(crate) declaring: TypeRef,
    pub(crate) visibility: Visibility,
    pub(crate) is_static: bool,
    pub(crate) body: MethodFn,
    pub(crate) attributes: Vec<AttributeEntry>,
}

/// Shared method descriptor
pub type MethodHandle = Arc<MethodDef>;

impl MethodDef {
    /// Member identity
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters in declaration order
    pub fn parameters(&self) -> &[ParameterDef] {
        &self.params
    }

    /// Return type, `None` for void
    pub fn return_type(&self) -> Option<&TypeRef> {
        self.return_type.as_ref()
    }

    /// Declaring type
    pub fn declaring_type(&self) -> &TypeRef {
        &self.declaring
    }

    /// Declared visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Whether the method is static
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Method body
    pub fn body(&self) -> &MethodFn {
        &self.body
    }

    /// Attributes declared on this method
    pub fn attributes(&self) -> &[AttributeEntry] {
        &self.attributes
    }

    /// Whether the parameter types are exactly `signature`
    pub fn has_signature(&self, signature: &[TypeId]) -> bool {
        params_match(&self.params, signature)
    }

    /// Invoke the body directly
    pub fn call(&self, this: &Value, args: &[Value]) -> HostResult<Value> {
        (self.body)(this, args)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("static", &self.is_static)
            .finish()
    }
}

/// Constructor descriptor
pub struct ConstructorDef {
    pub(crate) id: MemberId,
    pub(crate) params: Vec<ParameterDef>,
    pub(crate) declaring: TypeRef,
    pub(crate) visibility: Visibility,
    pub(crate) body: Option<ConstructorFn>,
    pub(crate) attributes: Vec<AttributeEntry>,
}

/// Shared constructor descriptor
pub type ConstructorHandle = Arc<ConstructorDef>;

impl ConstructorDef {
    /// Member identity
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Parameters in declaration order
    pub fn parameters(&self) -> &[ParameterDef] {
        &self.params
    }

    /// Declaring type
    pub fn declaring_type(&self) -> &TypeRef {
        &self.declaring
    }

    /// Declared visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Attributes declared on this constructor
    pub fn attributes(&self) -> &[AttributeEntry] {
        &self.attributes
    }

    /// Whether the parameter types are exactly `signature`
    pub fn has_signature(&self, signature: &[TypeId]) -> bool {
        params_match(&self.params, signature)
    }

    /// Run the body against an allocated instance
    pub fn initialize(&self, instance: &ObjectRef, args: &[Value]) -> HostResult<()> {
        match &self.body {
            Some(body) => body(instance, args),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ConstructorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDef")
            .field("id", &self.id)
            .field("declaring", &self.declaring.name())
            .field("params", &self.params)
            .finish()
    }
}

fn params_match(params: &[ParameterDef], signature: &[TypeId]) -> bool {
    params.len() == signature.len() && params.iter().zip(signature).all(|(p, id)| p.ty.id == *id)
}

// ============================================================================
// Types
// ============================================================================

/// Type descriptor
pub struct TypeDef {
    pub(crate) id: TypeId,
    pub(crate) name: String,
    pub(crate) module: String,
    pub(crate) kind: ValueKind,
    pub(crate) base: Option<TypeHandle>,
    pub(crate) fields: Vec<FieldHandle>,
    pub(crate) properties: Vec<PropertyHandle>,
    pub(crate) methods: Vec<MethodHandle>,
    pub(crate) constructors: Vec<ConstructorHandle>,
    pub(crate) attributes: Vec<AttributeEntry>,
}

/// Shared type descriptor
pub type TypeHandle = Arc<TypeDef>;

impl TypeDef {
    /// Type identity
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully-qualified name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the module that declares the type
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Kind of values of this type
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Whether instances are heap objects
    pub fn is_class(&self) -> bool {
        self.kind == ValueKind::Object
    }

    /// Direct base type
    pub fn base(&self) -> Option<&TypeHandle> {
        self.base.as_ref()
    }

    /// Reference to this type
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.id, self.kind, &self.name)
    }

    /// This type followed by its base types, nearest first
    pub fn hierarchy(&self) -> impl Iterator<Item = &TypeDef> {
        std::iter::successors(Some(self), |t| t.base.as_deref())
    }

    /// Whether this type is `ancestor` or derives from it
    pub fn is_subclass_of(&self, ancestor: TypeId) -> bool {
        self.hierarchy().any(|t| t.id == ancestor)
    }

    /// Fields declared on this type
    pub fn fields(&self) -> &[FieldHandle] {
        &self.fields
    }

    /// Properties declared on this type
    pub fn properties(&self) -> &[PropertyHandle] {
        &self.properties
    }

    /// Methods declared on this type
    pub fn methods(&self) -> &[MethodHandle] {
        &self.methods
    }

    /// Constructors declared on this type
    pub fn constructors(&self) -> &[ConstructorHandle] {
        &self.constructors
    }

    /// Attributes declared on this type
    pub fn attributes(&self) -> &[AttributeEntry] {
        &self.attributes
    }

    /// Kinds of every instance slot, base type slots first
    pub fn instance_field_kinds(&self) -> Vec<ValueKind> {
        let mut chain: Vec<&TypeDef> = self.hierarchy().collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|t| t.fields.iter())
            .filter(|f| !f.is_static())
            .map(|f| f.ty.kind)
            .collect()
    }

    /// Number of instance slots, including base type slots
    pub fn instance_slot_count(&self) -> usize {
        self.hierarchy()
            .map(|t| t.fields.iter().filter(|f| !f.is_static()).count())
            .sum()
    }
}

impl PartialEq for TypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDef {}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("module", &self.module)
            .field("kind", &self.kind)
            .field("base", &self.base.as_ref().map(|b| b.name.clone()))
            .finish()
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_ids_are_fixed() {
        assert_eq!(Primitive::Object.type_id(), TypeId(1));
        assert_eq!(Primitive::String.type_id(), TypeId(6));
        for p in Primitive::ALL {
            assert!(p.type_id().as_u32() < FIRST_USER_TYPE_ID);
            assert_eq!(Primitive::of_kind(p.kind()), Some(p));
        }
        assert!(TypeId::new().as_u32() >= FIRST_USER_TYPE_ID);
    }

    #[test]
    fn test_type_ref_equality_is_by_id() {
        let a = TypeRef::new(TypeId(99_000), ValueKind::Object, "a.A");
        let b = TypeRef::new(TypeId(99_000), ValueKind::Object, "renamed");
        assert_eq!(a, b);
        assert_ne!(a, TypeRef::from(Primitive::I32));
    }

    #[derive(Debug, PartialEq)]
    struct Marker(u8);

    #[test]
    fn test_attribute_downcast() {
        let entry = AttributeEntry::new(Marker(3));
        assert!(entry.is::<Marker>());
        assert!(!entry.is::<String>());
        assert_eq!(entry.downcast::<Marker>().as_deref(), Some(&Marker(3)));
        assert!(entry.is_inherited());
        assert!(!entry.not_inherited().is_inherited());
    }
}
