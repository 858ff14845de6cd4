//! Type builder
//!
//! Types are assembled from member definitions and frozen into an immutable
//! `TypeHandle`. Member bodies are ordinary Rust closures.
//!
//! ```ignore
//! let point = TypeBuilder::class("geometry", "geometry.Point")
//!     .field(FieldDefinition::new("X", Primitive::I32))
//!     .field(FieldDefinition::new("Y", Primitive::I32))
//!     .build();
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::HostResult;
use crate::flags::Visibility;
use crate::object::ObjectRef;
use crate::ty::{
    AttributeEntry, ConstructorDef, ConstructorFn, FieldDef, FieldStorage, MemberId, MethodDef,
    MethodFn, ParameterDef, Primitive, PropertyDef, PropertyGetFn, PropertySetFn, TypeDef,
    TypeHandle, TypeId, TypeRef,
};
use crate::value::{Value, ValueKind};

/// Definition for a field
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: TypeRef,
    /// Visibility
    pub visibility: Visibility,
    /// Whether this is a static field
    pub is_static: bool,
    /// Whether this field is readonly
    pub is_readonly: bool,
    /// Initial value of a static field
    pub initial_value: Option<Value>,
    /// Attributes
    pub attributes: Vec<AttributeEntry>,
}

impl FieldDefinition {
    /// Create a public instance field
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            visibility: Visibility::Public,
            is_static: false,
            is_readonly: false,
            initial_value: None,
            attributes: Vec::new(),
        }
    }

    /// Mark as private
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Mark as protected
    pub fn protected(mut self) -> Self {
        self.visibility = Visibility::Protected;
        self
    }

    /// Mark as static field
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as readonly
    pub fn as_readonly(mut self) -> Self {
        self.is_readonly = true;
        self
    }

    /// Set the initial value (static fields only)
    pub fn initial_value(mut self, value: Value) -> Self {
        self.initial_value = Some(value);
        self
    }

    /// Attach an attribute
    pub fn attribute(mut self, attribute: AttributeEntry) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Definition for a property
#[derive(Clone)]
pub struct PropertyDefinition {
    /// Property name
    pub name: String,
    /// Declared type
    pub ty: TypeRef,
    /// Visibility
    pub visibility: Visibility,
    /// Whether this is a static property
    pub is_static: bool,
    /// Read body
    pub getter: Option<PropertyGetFn>,
    /// Write body
    pub setter: Option<PropertySetFn>,
    /// Attributes
    pub attributes: Vec<AttributeEntry>,
}

impl PropertyDefinition {
    /// Create a public instance property with no bodies
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            visibility: Visibility::Public,
            is_static: false,
            getter: None,
            setter: None,
            attributes: Vec::new(),
        }
    }

    /// Set the read body
    pub fn getter<F>(mut self, body: F) -> Self
    where
        F: Fn(&Value) -> HostResult<Value> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(body));
        self
    }

    /// Set the write body
    pub fn setter<F>(mut self, body: F) -> Self
    where
        F: Fn(&Value, Value) -> HostResult<()> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(body));
        self
    }

    /// Mark as private
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Mark as static property
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Attach an attribute
    pub fn attribute(mut self, attribute: AttributeEntry) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Definition for a method
#[derive(Clone)]
pub struct MethodDefinition {
    /// Method name
    pub name: String,
    /// Parameters
    pub parameters: Vec<ParameterDef>,
    /// Return type, `None` for void
    pub return_type: Option<TypeRef>,
    /// Visibility
    pub visibility: Visibility,
    /// Whether this is a static method
    pub is_static: bool,
    /// Body
    pub body: MethodFn,
    /// Attributes
    pub attributes: Vec<AttributeEntry>,
}

impl MethodDefinition {
    /// Create a public instance method returning void
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            visibility: Visibility::Public,
            is_static: false,
            body: Arc::new(body),
            attributes: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    /// Set return type
    pub fn returns(mut self, ty: impl Into<TypeRef>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    /// Mark as private
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Mark as protected
    pub fn protected(mut self) -> Self {
        self.visibility = Visibility::Protected;
        self
    }

    /// Mark as static method
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Attach an attribute
    pub fn attribute(mut self, attribute: AttributeEntry) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Definition for a constructor
#[derive(Clone)]
pub struct ConstructorDefinition {
    /// Parameters
    pub parameters: Vec<ParameterDef>,
    /// Visibility
    pub visibility: Visibility,
    /// Body, `None` leaves every field at its default
    pub body: Option<ConstructorFn>,
    /// Attributes
    pub attributes: Vec<AttributeEntry>,
}

impl ConstructorDefinition {
    /// Create a public constructor with a body
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> HostResult<()> + Send + Sync + 'static,
    {
        Self {
            parameters: Vec::new(),
            visibility: Visibility::Public,
            body: Some(Arc::new(body)),
            attributes: Vec::new(),
        }
    }

    /// Create a public no-argument constructor that only allocates
    pub fn empty() -> Self {
        Self {
            parameters: Vec::new(),
            visibility: Visibility::Public,
            body: None,
            attributes: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    /// Mark as private
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Attach an attribute
    pub fn attribute(mut self, attribute: AttributeEntry) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Builder for a class or primitive type
pub struct TypeBuilder {
    id: TypeId,
    name: String,
    module: String,
    kind: ValueKind,
    base: Option<TypeHandle>,
    fields: Vec<FieldDefinition>,
    properties: Vec<PropertyDefinition>,
    methods: Vec<MethodDefinition>,
    constructors: Vec<ConstructorDefinition>,
    attributes: Vec<AttributeEntry>,
}

impl TypeBuilder {
    /// Start a root class
    pub fn class(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_id(TypeId::new(), module, name, ValueKind::Object)
    }

    /// Start a class deriving from `base`
    pub fn subclass(module: impl Into<String>, name: impl Into<String>, base: &TypeHandle) -> Self {
        let mut builder = Self::class(module, name);
        builder.base = Some(base.clone());
        builder
    }

    /// Start a primitive type with its fixed id
    pub(crate) fn primitive(module: impl Into<String>, primitive: Primitive) -> Self {
        Self::with_id(primitive.type_id(), module, primitive.name(), primitive.kind())
    }

    fn with_id(
        id: TypeId,
        module: impl Into<String>,
        name: impl Into<String>,
        kind: ValueKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            module: module.into(),
            kind,
            base: None,
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Reference to the type under construction, for self-referencing members
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.id, self.kind, &self.name)
    }

    /// Add a field
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a property
    pub fn property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    /// Add a method
    pub fn method(mut self, method: MethodDefinition) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a constructor
    pub fn constructor(mut self, constructor: ConstructorDefinition) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Attach an attribute to the type
    pub fn attribute(mut self, attribute: AttributeEntry) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Freeze into a type handle.
    ///
    /// A class without constructors receives an implicit public no-argument
    /// constructor.
    pub fn build(mut self) -> TypeHandle {
        if self.kind == ValueKind::Object && self.constructors.is_empty() {
            self.constructors.push(ConstructorDefinition::empty());
        }

        let declaring = self.type_ref();
        let mut ordinal = 0u32;
        let mut next_id = || {
            let id = MemberId {
                owner: self.id,
                ordinal,
            };
            ordinal += 1;
            id
        };

        let mut slot = self.base.as_ref().map_or(0, |b| b.instance_slot_count());
        let fields = self
            .fields
            .into_iter()
            .map(|f| {
                let storage = if f.is_static {
                    let initial = f
                        .initial_value
                        .unwrap_or_else(|| Value::default_for(f.ty.kind()));
                    FieldStorage::Static(Arc::new(RwLock::new(initial)))
                } else {
                    slot += 1;
                    FieldStorage::Instance(slot - 1)
                };
                Arc::new(FieldDef {
                    id: next_id(),
                    name: f.name,
                    ty: f.ty,
                    declaring: declaring.clone(),
                    visibility: f.visibility,
                    readonly: f.is_readonly,
                    storage,
                    attributes: f.attributes,
                })
            })
            .collect();

        let properties = self
            .properties
            .into_iter()
            .map(|p| {
                Arc::new(PropertyDef {
                    id: next_id(),
                    name: p.name,
                    ty: p.ty,
                    declaring: declaring.clone(),
                    visibility: p.visibility,
                    is_static: p.is_static,
                    getter: p.getter,
                    setter: p.setter,
                    attributes: p.attributes,
                })
            })
            .collect();

        let methods = self
            .methods
            .into_iter()
            .map(|m| {
                Arc::new(MethodDef {
                    id: next_id(),
                    name: m.name,
                    params: m.parameters,
                    return_type: m.return_type,
                    declaring: declaring.clone(),
                    visibility: m.visibility,
                    is_static: m.is_static,
                    body: m.body,
                    attributes: m.attributes,
                })
            })
            .collect();

        let constructors = self
            .constructors
            .into_iter()
            .map(|c| {
                Arc::new(ConstructorDef {
                    id: next_id(),
                    params: c.parameters,
                    declaring: declaring.clone(),
                    visibility: c.visibility,
                    body: c.body,
                    attributes: c.attributes,
                })
            })
            .collect();

        Arc::new(TypeDef {
            id: self.id,
            name: self.name,
            module: self.module,
            kind: self.kind,
            base: self.base,
            fields,
            properties,
            methods,
            constructors,
            attributes: self.attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_follow_base_layout() {
        let shape = TypeBuilder::class("geo", "geo.Shape")
            .field(FieldDefinition::new("name", Primitive::String))
            .field(FieldDefinition::new("count", Primitive::I32).as_static())
            .build();
        let circle = TypeBuilder::subclass("geo", "geo.Circle", &shape)
            .field(FieldDefinition::new("radius", Primitive::F64))
            .build();

        assert_eq!(shape.instance_slot_count(), 1);
        assert_eq!(circle.instance_slot_count(), 2);
        assert!(matches!(
            circle.fields()[0].storage(),
            FieldStorage::Instance(1)
        ));
        assert!(shape.fields()[1].is_static());
        assert_eq!(
            circle.instance_field_kinds(),
            vec![ValueKind::Str, ValueKind::F64]
        );
    }

    #[test]
    fn test_implicit_constructor() {
        let empty = TypeBuilder::class("m", "m.Empty").build();
        assert_eq!(empty.constructors().len(), 1);
        assert!(empty.constructors()[0].parameters().is_empty());

        let explicit = TypeBuilder::class("m", "m.Explicit")
            .constructor(ConstructorDefinition::empty().param("x", Primitive::I32))
            .build();
        assert_eq!(explicit.constructors().len(), 1);
        assert_eq!(explicit.constructors()[0].parameters().len(), 1);
    }

    #[test]
    fn test_member_ids_are_distinct() {
        let ty = TypeBuilder::class("m", "m.T")
            .field(FieldDefinition::new("a", Primitive::I32))
            .method(MethodDefinition::new("go", |_, _| Ok(Value::Null)))
            .build();
        let field_id = ty.fields()[0].id();
        let method_id = ty.methods()[0].id();
        assert_ne!(field_id, method_id);
        assert_eq!(field_id.owner, ty.id());
        assert_eq!(method_id.owner, ty.id());
    }

    #[test]
    fn test_self_reference() {
        let builder = TypeBuilder::class("list", "list.Node");
        let node_ref = builder.type_ref();
        let node = builder
            .field(FieldDefinition::new("next", node_ref.clone()))
            .build();
        assert_eq!(node.fields()[0].field_type().id(), node.id());
    }
}
