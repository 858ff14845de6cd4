//! Heap instances
//!
//! An `Object` owns one slot per instance field of its type (base type
//! fields first). Slots are guarded by a `parking_lot::RwLock` so compiled
//! accessors may be shared across threads.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ty::TypeHandle;
use crate::value::Value;

/// Process-unique object identity, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    /// Generate a new unique ObjectId
    pub fn new() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared handle to an object
pub type ObjectRef = Arc<Object>;

/// Instance of a class type
pub struct Object {
    id: ObjectId,
    ty: TypeHandle,
    slots: RwLock<Vec<Value>>,
}

impl Object {
    /// Allocate an instance with every field at its default value
    pub fn alloc(ty: &TypeHandle) -> ObjectRef {
        let slots = ty
            .instance_field_kinds()
            .into_iter()
            .map(Value::default_for)
            .collect();
        Arc::new(Object {
            id: ObjectId::new(),
            ty: ty.clone(),
            slots: RwLock::new(slots),
        })
    }

    /// Object identity
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Runtime type of this object
    pub fn type_handle(&self) -> &TypeHandle {
        &self.ty
    }

    /// Read a slot
    pub fn slot(&self, index: usize) -> Option<Value> {
        self.slots.read().get(index).cloned()
    }

    /// Write a slot, returns false if the index is out of range
    pub fn set_slot(&self, index: usize, value: Value) -> bool {
        let mut slots = self.slots.write();
        match slots.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.slots.read().len()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("type", &self.ty.name())
            .field("slots", &*self.slots.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ids_are_unique() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }
}
