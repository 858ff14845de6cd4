//! Mirror host type model
//!
//! This crate provides the runtime type system that the Mirror reflection
//! cache wraps: dynamic values, immutable type and member descriptors,
//! modules, and the live introspection queries over them.
//!
//! # Example
//!
//! ```ignore
//! use mirror_types::{FieldDefinition, Module, Primitive, TypeBuilder, Universe};
//!
//! let point = TypeBuilder::class("geometry", "geometry.Point")
//!     .field(FieldDefinition::new("X", Primitive::I32))
//!     .field(FieldDefinition::new("Y", Primitive::I32))
//!     .build();
//!
//! let universe = Universe::new();
//! universe.register_module(Module::new("geometry").with_type(point))?;
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod convert;
pub mod error;
pub mod flags;
pub mod object;
pub mod ty;
pub mod universe;
pub mod value;

pub use builder::{
    ConstructorDefinition, FieldDefinition, MethodDefinition, PropertyDefinition, TypeBuilder,
};
pub use convert::{coerce, is_assignable, Conversion, Reflected};
pub use error::{HostError, HostResult};
pub use flags::{BindingFlags, Visibility};
pub use object::{Object, ObjectId, ObjectRef};
pub use ty::{
    AttributeEntry, ConstructorDef, ConstructorFn, ConstructorHandle, FieldDef, FieldHandle,
    FieldStorage, MemberId, MethodDef, MethodFn, MethodHandle, ParameterDef, Primitive,
    PropertyDef, PropertyGetFn, PropertyHandle, PropertySetFn, TypeDef, TypeHandle, TypeId,
    TypeRef,
};
pub use universe::{IntrospectionStats, Module, Universe, CORE_MODULE};
pub use value::{Value, ValueKind};
