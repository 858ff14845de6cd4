//! Dynamic values
//!
//! `Value` is the currency of the host model: field slots, property bodies,
//! method arguments and return values all carry it. Primitive values are
//! stored inline; strings are shared `Arc<str>`; objects are reference
//! counted handles with identity.

use std::fmt;
use std::sync::Arc;

use crate::object::ObjectRef;

/// Kind of a value or of a declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Any value (the declared type `object`)
    Any,
    /// Boolean
    Bool,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 64-bit float
    F64,
    /// String
    Str,
    /// Instance of a class
    Object,
}

impl ValueKind {
    /// Name used in diagnostics
    pub fn type_name(self) -> &'static str {
        match self {
            ValueKind::Any => "object",
            ValueKind::Bool => "bool",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::F64 => "f64",
            ValueKind::Str => "string",
            ValueKind::Object => "class",
        }
    }

    /// Whether a slot of this kind may hold null
    pub fn is_reference(self) -> bool {
        matches!(self, ValueKind::Any | ValueKind::Str | ValueKind::Object)
    }

    /// Whether this is one of the numeric kinds
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueKind::I32 | ValueKind::I64 | ValueKind::F64)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Dynamic value
#[derive(Clone, Default)]
pub enum Value {
    /// Absent reference
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 64-bit float
    F64(f64),
    /// Immutable shared string
    Str(Arc<str>),
    /// Object handle
    Object(ObjectRef),
}

impl Value {
    /// Create a string value
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Default value stored in a fresh slot of the given kind
    pub fn default_for(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::I32 => Value::I32(0),
            ValueKind::I64 => Value::I64(0),
            ValueKind::F64 => Value::F64(0.0),
            ValueKind::Any | ValueKind::Str | ValueKind::Object => Value::Null,
        }
    }

    /// Runtime kind, `None` for null
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::I32(_) => Some(ValueKind::I32),
            Value::I64(_) => Some(ValueKind::I64),
            Value::F64(_) => Some(ValueKind::F64),
            Value::Str(_) => Some(ValueKind::Str),
            Value::Object(_) => Some(ValueKind::Object),
        }
    }

    /// Name of the runtime type, for diagnostics
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Object(obj) => obj.type_handle().name().to_string(),
            other => other
                .kind()
                .map(|k| k.type_name().to_string())
                .unwrap_or_default(),
        }
    }

    /// Check for null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as object handle
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::I32(i) => write!(f, "I32({i})"),
            Value::I64(i) => write!(f, "I64({i})"),
            Value::F64(x) => write!(f, "F64({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(obj) => write!(f, "Object({}#{})", obj.type_handle().name(), obj.id()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::I32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::I64(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<&ObjectRef> for Value {
    fn from(obj: &ObjectRef) -> Self {
        Value::Object(obj.clone())
    }
}
