//! Composite cache keys
//!
//! Keys have value semantics: two lookups with identical inputs build equal
//! keys and therefore share a cache slot.

use std::any::TypeId as RustTypeId;
use std::sync::Arc;

use mirror_types::{BindingFlags, ObjectId, TypeId};

/// Which member table a key addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Field
    Field,
    /// Property
    Property,
    /// Method
    Method,
    /// Constructor
    Constructor,
}

/// Parameter-type signature of a method or constructor lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signature {
    /// No explicit signature, the first declared match wins
    Any,
    /// Ordered parameter type identities
    Exact(Vec<TypeId>),
}

impl Signature {
    /// Exact signature from parameter types
    pub fn exact(types: impl IntoIterator<Item = TypeId>) -> Self {
        Signature::Exact(types.into_iter().collect())
    }

    /// The empty signature of a no-argument member
    pub fn empty() -> Self {
        Signature::Exact(Vec::new())
    }

    pub(crate) fn as_slice(&self) -> Option<&[TypeId]> {
        match self {
            Signature::Any => None,
            Signature::Exact(types) => Some(types),
        }
    }
}

/// Key of a member metadata slot.
///
/// Constructors use an empty name and are distinguished by signature alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    /// Type the lookup was made against
    pub owner: TypeId,
    /// Member kind
    pub kind: MemberKind,
    /// Member name
    pub name: Arc<str>,
    /// Visibility flags of the lookup
    pub flags: BindingFlags,
    /// Parameter signature, `Any` for fields and properties
    pub signature: Signature,
}

impl MemberKey {
    /// Key for a field or property lookup
    pub fn named(owner: TypeId, kind: MemberKind, name: &str, flags: BindingFlags) -> Self {
        Self {
            owner,
            kind,
            name: Arc::from(name),
            flags,
            signature: Signature::Any,
        }
    }

    /// Key for a method lookup
    pub fn method(owner: TypeId, name: &str, flags: BindingFlags, signature: Signature) -> Self {
        Self {
            owner,
            kind: MemberKind::Method,
            name: Arc::from(name),
            flags,
            signature,
        }
    }

    /// Key for a constructor lookup
    pub fn constructor(owner: TypeId, flags: BindingFlags, signature: Signature) -> Self {
        Self {
            owner,
            kind: MemberKind::Constructor,
            name: Arc::from(""),
            flags,
            signature,
        }
    }
}

/// Key of a compiled getter or setter: target type, member name and the
/// Rust type read or written
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessorKey {
    /// Target type
    pub owner: TypeId,
    /// Member name
    pub name: Arc<str>,
    /// Requested result or value type
    pub value_type: RustTypeId,
}

/// What a bound invoker is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Static method, no instance
    Static,
    /// Instance method on one specific object
    Instance(ObjectId),
}

/// Key of a bound invoker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvokerKey {
    /// Receiver type
    pub owner: TypeId,
    /// Method name
    pub name: Arc<str>,
    /// Delegate shape
    pub shape: RustTypeId,
    /// Static marker or instance identity
    pub binding: Binding,
}
