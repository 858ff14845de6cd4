//! Attribute queries on types and members
//!
//! Attributes are read straight from the descriptors; there is no cache of
//! its own. With `inherit`, base types are searched as well: a type sees the
//! inheritable attributes of its ancestors, and a method or property sees
//! those of the same-named member it hides in a base type. Field and
//! constructor attributes are never inherited.

use std::any::Any;
use std::sync::Arc;

use mirror_types::{
    AttributeEntry, BindingFlags, ConstructorDef, FieldDef, MethodDef, PropertyDef, TypeDef,
    TypeHandle, TypeId, Universe,
};

use crate::error::ReflectResult;
use crate::members::{MemberDescriptor, MemberMetadataCache};

/// Something attributes can be attached to
#[derive(Debug, Clone, Copy)]
pub enum AttributeTarget<'a> {
    /// A type
    Type(&'a TypeDef),
    /// A field
    Field(&'a FieldDef),
    /// A property
    Property(&'a PropertyDef),
    /// A method
    Method(&'a MethodDef),
    /// A constructor
    Constructor(&'a ConstructorDef),
}

impl<'a> From<&'a TypeDef> for AttributeTarget<'a> {
    fn from(ty: &'a TypeDef) -> Self {
        AttributeTarget::Type(ty)
    }
}

impl<'a> From<&'a TypeHandle> for AttributeTarget<'a> {
    fn from(ty: &'a TypeHandle) -> Self {
        AttributeTarget::Type(ty)
    }
}

impl<'a> From<&'a MemberDescriptor> for AttributeTarget<'a> {
    fn from(member: &'a MemberDescriptor) -> Self {
        match member {
            MemberDescriptor::Field(f) => AttributeTarget::Field(f),
            MemberDescriptor::Property(p) => AttributeTarget::Property(p),
            MemberDescriptor::Method(m) => AttributeTarget::Method(m),
            MemberDescriptor::Constructor(c) => AttributeTarget::Constructor(c),
        }
    }
}

/// Reads attributes of types and members
pub struct AttributeInspector {
    members: Arc<MemberMetadataCache>,
}

impl AttributeInspector {
    /// Create an inspector resolving members through `members`
    pub fn new(members: Arc<MemberMetadataCache>) -> Self {
        Self { members }
    }

    fn universe(&self) -> &Universe {
        self.members.universe()
    }

    /// First attribute of type `A`, own attributes before inherited ones
    pub fn attribute<A: Any + Send + Sync>(
        &self,
        target: AttributeTarget<'_>,
        inherit: bool,
    ) -> Option<Arc<A>> {
        self.collect(target, inherit, None)
            .into_iter()
            .find_map(|entry| entry.downcast::<A>())
    }

    /// Every attribute of type `A`, own attributes before inherited ones
    pub fn attributes<A: Any + Send + Sync>(
        &self,
        target: AttributeTarget<'_>,
        inherit: bool,
    ) -> Vec<Arc<A>> {
        self.collect(target, inherit, None)
            .into_iter()
            .filter_map(|entry| entry.downcast::<A>())
            .collect()
    }

    /// Whether an attribute of type `A` is present
    pub fn has_attribute<A: Any + Send + Sync>(
        &self,
        target: AttributeTarget<'_>,
        inherit: bool,
    ) -> bool {
        self.collect(target, inherit, None)
            .iter()
            .any(|entry| entry.is::<A>())
    }

    /// First attribute of type `A` on the member `name` of `ty`.
    ///
    /// The member is resolved as a property, then a field, then a method.
    /// A missing member yields `None`.
    pub fn member_attribute<A: Any + Send + Sync>(
        &self,
        ty: &TypeDef,
        name: &str,
        inherit: bool,
    ) -> ReflectResult<Option<Arc<A>>> {
        let member = self.members.resolve_member(ty, name, BindingFlags::ALL)?;
        Ok(member.and_then(|m| {
            self.collect((&m).into(), inherit, Some(ty))
                .into_iter()
                .find_map(|entry| entry.downcast::<A>())
        }))
    }

    /// Every attribute of type `A` on the member `name` of `ty`
    pub fn member_attributes<A: Any + Send + Sync>(
        &self,
        ty: &TypeDef,
        name: &str,
        inherit: bool,
    ) -> ReflectResult<Vec<Arc<A>>> {
        let member = self.members.resolve_member(ty, name, BindingFlags::ALL)?;
        Ok(member
            .map(|m| {
                self.collect((&m).into(), inherit, Some(ty))
                    .into_iter()
                    .filter_map(|entry| entry.downcast::<A>())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Every loaded type carrying an attribute of type `A`
    pub fn types_with_attribute<A: Any + Send + Sync>(&self, inherit: bool) -> Vec<TypeHandle> {
        self.universe()
            .all_types()
            .into_iter()
            .filter(|ty| self.has_attribute::<A>(AttributeTarget::Type(ty), inherit))
            .collect()
    }

    /// `owner` is the type a member was resolved on, if known
    fn collect(
        &self,
        target: AttributeTarget<'_>,
        inherit: bool,
        owner: Option<&TypeDef>,
    ) -> Vec<AttributeEntry> {
        let mut found: Vec<AttributeEntry> = own_attributes(target).to_vec();
        if !inherit {
            return found;
        }

        match target {
            AttributeTarget::Type(ty) => {
                for base in ty.hierarchy().skip(1) {
                    found.extend(inheritable(base.attributes()));
                }
            }
            AttributeTarget::Property(p) => {
                for base in self.bases_of(p.declaring_type().id(), owner) {
                    if let Some(hidden) = base.properties().iter().find(|b| b.name() == p.name()) {
                        found.extend(inheritable(hidden.attributes()));
                    }
                }
            }
            AttributeTarget::Method(m) => {
                let signature: Vec<_> = m.parameters().iter().map(|p| p.ty.id()).collect();
                for base in self.bases_of(m.declaring_type().id(), owner) {
                    if let Some(hidden) = base
                        .methods()
                        .iter()
                        .find(|b| b.name() == m.name() && b.has_signature(&signature))
                    {
                        found.extend(inheritable(hidden.attributes()));
                    }
                }
            }
            AttributeTarget::Field(_) | AttributeTarget::Constructor(_) => {}
        }
        found
    }

    /// Strict ancestors of the declaring type, nearest first. The declaring
    /// type is found in `owner`'s hierarchy, falling back to the universe.
    fn bases_of(&self, declaring: TypeId, owner: Option<&TypeDef>) -> Vec<TypeHandle> {
        let mut bases = Vec::new();
        let declared_in = owner.and_then(|ty| ty.hierarchy().find(|t| t.id() == declaring));
        let mut current = match declared_in {
            Some(ty) => ty.base().cloned(),
            None => self
                .universe()
                .type_by_id(declaring)
                .and_then(|t| t.base().cloned()),
        };
        while let Some(ty) = current {
            current = ty.base().cloned();
            bases.push(ty);
        }
        bases
    }
}

fn own_attributes(target: AttributeTarget<'_>) -> &[AttributeEntry] {
    match target {
        AttributeTarget::Type(ty) => ty.attributes(),
        AttributeTarget::Field(f) => f.attributes(),
        AttributeTarget::Property(p) => p.attributes(),
        AttributeTarget::Method(m) => m.attributes(),
        AttributeTarget::Constructor(c) => c.attributes(),
    }
}

fn inheritable(entries: &[AttributeEntry]) -> impl Iterator<Item = AttributeEntry> + '_ {
    entries.iter().filter(|e| e.is_inherited()).cloned()
}
