//! Conversions between values and declared types
//!
//! Two flavours exist:
//!
//! - [`Conversion::plan`] decides statically, from kinds alone, whether a
//!   value of one declared kind may be read as another. Compiled accessors
//!   and bound invokers plan once and apply the result on every call.
//! - [`coerce`] attempts to convert a concrete value to a declared type and
//!   reports failure. Overload matching uses it, so a candidate is judged by
//!   whether the conversion actually succeeds for the argument at hand.

use std::sync::Arc;

use crate::error::{HostError, HostResult};
use crate::object::ObjectRef;
use crate::ty::TypeRef;
use crate::value::{Value, ValueKind};

/// Rust types that can cross the dynamic boundary
///
/// Implemented for the types usable as compiled accessor results, setter
/// values and delegate parameters.
pub trait Reflected: Sized + Send + Sync + 'static {
    /// Declared kind this Rust type corresponds to
    const KIND: ValueKind;

    /// Convert from a value of kind `KIND`
    fn from_value(value: Value) -> HostResult<Self>;

    /// Convert into a value
    fn into_value(self) -> Value;
}

fn mismatch(expected: ValueKind, got: &Value) -> HostError {
    HostError::TypeMismatch {
        expected: expected.type_name().to_string(),
        got: got.type_name(),
    }
}

impl Reflected for i32 {
    const KIND: ValueKind = ValueKind::I32;

    fn from_value(value: Value) -> HostResult<Self> {
        value.as_i32().ok_or_else(|| mismatch(Self::KIND, &value))
    }

    fn into_value(self) -> Value {
        Value::I32(self)
    }
}

impl Reflected for i64 {
    const KIND: ValueKind = ValueKind::I64;

    fn from_value(value: Value) -> HostResult<Self> {
        value.as_i64().ok_or_else(|| mismatch(Self::KIND, &value))
    }

    fn into_value(self) -> Value {
        Value::I64(self)
    }
}

impl Reflected for f64 {
    const KIND: ValueKind = ValueKind::F64;

    fn from_value(value: Value) -> HostResult<Self> {
        value.as_f64().ok_or_else(|| mismatch(Self::KIND, &value))
    }

    fn into_value(self) -> Value {
        Value::F64(self)
    }
}

impl Reflected for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_value(value: Value) -> HostResult<Self> {
        value.as_bool().ok_or_else(|| mismatch(Self::KIND, &value))
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl Reflected for String {
    const KIND: ValueKind = ValueKind::Str;

    fn from_value(value: Value) -> HostResult<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch(Self::KIND, &value))
    }

    fn into_value(self) -> Value {
        Value::Str(Arc::from(self))
    }
}

impl Reflected for ObjectRef {
    const KIND: ValueKind = ValueKind::Object;

    fn from_value(value: Value) -> HostResult<Self> {
        match value {
            Value::Object(obj) => Ok(obj),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Object(self)
    }
}

impl Reflected for Value {
    const KIND: ValueKind = ValueKind::Any;

    fn from_value(value: Value) -> HostResult<Self> {
        Ok(value)
    }

    fn into_value(self) -> Value {
        self
    }
}

/// Nullable view of a member: `None` maps to null
impl<T: Reflected> Reflected for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn from_value(value: Value) -> HostResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, T::into_value)
    }
}

/// A conversion planned from declared kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Same kind, value passes through
    Identity,
    /// Any kind widened to `object`
    Box,
    /// `object` narrowed to a concrete kind, checked per value
    Unbox(ValueKind),
    /// Explicit numeric conversion with cast semantics
    Numeric(ValueKind),
}

impl Conversion {
    /// Plan a conversion from values declared as `from` to `to`.
    ///
    /// Returns `None` when no implicit or explicit conversion exists.
    pub fn plan(from: ValueKind, to: ValueKind) -> Option<Conversion> {
        match (from, to) {
            (a, b) if a == b => Some(Conversion::Identity),
            (_, ValueKind::Any) => Some(Conversion::Box),
            (ValueKind::Any, to) => Some(Conversion::Unbox(to)),
            (a, b) if a.is_numeric() && b.is_numeric() => Some(Conversion::Numeric(b)),
            _ => None,
        }
    }

    /// Apply the planned conversion to a value
    pub fn apply(self, value: Value) -> HostResult<Value> {
        match self {
            Conversion::Identity | Conversion::Box => Ok(value),
            Conversion::Unbox(kind) => {
                if value.kind() == Some(kind) || (value.is_null() && kind.is_reference()) {
                    Ok(value)
                } else {
                    Err(HostError::InvalidCast {
                        from: value.type_name(),
                        to: kind.type_name().to_string(),
                    })
                }
            }
            Conversion::Numeric(kind) => cast_numeric(value, kind),
        }
    }
}

/// Explicit numeric cast: integer narrowing wraps, float to integer
/// truncates and saturates.
fn cast_numeric(value: Value, to: ValueKind) -> HostResult<Value> {
    let converted = match (&value, to) {
        (Value::I32(i), ValueKind::I64) => Value::I64(*i as i64),
        (Value::I32(i), ValueKind::F64) => Value::F64(*i as f64),
        (Value::I64(i), ValueKind::I32) => Value::I32(*i as i32),
        (Value::I64(i), ValueKind::F64) => Value::F64(*i as f64),
        (Value::F64(f), ValueKind::I32) => Value::I32(*f as i32),
        (Value::F64(f), ValueKind::I64) => Value::I64(*f as i64),
        (v, k) if v.kind() == Some(k) => value.clone(),
        _ => {
            return Err(HostError::InvalidCast {
                from: value.type_name(),
                to: to.type_name().to_string(),
            })
        }
    };
    Ok(converted)
}

/// Whether `value` may be stored in a slot declared as `declared` without
/// conversion
pub fn is_assignable(value: &Value, declared: &TypeRef) -> bool {
    match value {
        Value::Null => declared.kind().is_reference(),
        Value::Object(obj) => match declared.kind() {
            ValueKind::Any => true,
            ValueKind::Object => obj.type_handle().is_subclass_of(declared.id()),
            _ => false,
        },
        other => declared.kind() == ValueKind::Any || other.kind() == Some(declared.kind()),
    }
}

/// Attempt to convert `value` to `target`.
///
/// Assignable values pass through unchanged. Otherwise numeric conversions
/// must be lossless in range, strings are parsed, and primitives format to
/// strings. Returns `None` when the conversion fails.
pub fn coerce(value: &Value, target: &TypeRef) -> Option<Value> {
    if is_assignable(value, target) {
        return Some(value.clone());
    }
    match (value, target.kind()) {
        (Value::I32(i), ValueKind::I64) => Some(Value::I64(*i as i64)),
        (Value::I32(i), ValueKind::F64) => Some(Value::F64(*i as f64)),
        (Value::I64(i), ValueKind::I32) => i32::try_from(*i).ok().map(Value::I32),
        (Value::I64(i), ValueKind::F64) => Some(Value::F64(*i as f64)),
        (Value::F64(f), ValueKind::I32) => {
            let r = f.round_ties_even();
            (f.is_finite() && r >= i32::MIN as f64 && r <= i32::MAX as f64)
                .then(|| Value::I32(r as i32))
        }
        (Value::F64(f), ValueKind::I64) => {
            let r = f.round_ties_even();
            (f.is_finite() && r >= i64::MIN as f64 && r < i64::MAX as f64)
                .then(|| Value::I64(r as i64))
        }
        (Value::Bool(b), ValueKind::I32) => Some(Value::I32(*b as i32)),
        (Value::Bool(b), ValueKind::I64) => Some(Value::I64(*b as i64)),
        (Value::Bool(b), ValueKind::F64) => Some(Value::F64(if *b { 1.0 } else { 0.0 })),
        (Value::I32(i), ValueKind::Bool) => Some(Value::Bool(*i != 0)),
        (Value::I64(i), ValueKind::Bool) => Some(Value::Bool(*i != 0)),
        (Value::F64(f), ValueKind::Bool) => Some(Value::Bool(*f != 0.0)),
        (Value::Str(s), ValueKind::I32) => s.trim().parse().ok().map(Value::I32),
        (Value::Str(s), ValueKind::I64) => s.trim().parse().ok().map(Value::I64),
        (Value::Str(s), ValueKind::F64) => s.trim().parse().ok().map(Value::F64),
        (Value::Str(s), ValueKind::Bool) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (Value::Bool(b), ValueKind::Str) => Some(Value::str(if *b { "True" } else { "False" })),
        (Value::I32(i), ValueKind::Str) => Some(Value::str(i.to_string())),
        (Value::I64(i), ValueKind::Str) => Some(Value::str(i.to_string())),
        (Value::F64(f), ValueKind::Str) => Some(Value::str(f.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Primitive;

    #[test]
    fn test_plan_legality() {
        use ValueKind::*;
        assert_eq!(Conversion::plan(I32, I32), Some(Conversion::Identity));
        assert_eq!(Conversion::plan(I32, I64), Some(Conversion::Numeric(I64)));
        assert_eq!(Conversion::plan(F64, I32), Some(Conversion::Numeric(I32)));
        assert_eq!(Conversion::plan(Str, Any), Some(Conversion::Box));
        assert_eq!(Conversion::plan(Any, Bool), Some(Conversion::Unbox(Bool)));
        assert_eq!(Conversion::plan(I32, Str), None);
        assert_eq!(Conversion::plan(Bool, I32), None);
        assert_eq!(Conversion::plan(Object, I32), None);
    }

    #[test]
    fn test_apply_numeric() {
        let widen = Conversion::plan(ValueKind::I32, ValueKind::I64).unwrap();
        assert_eq!(widen.apply(Value::I32(i32::MIN)).unwrap(), Value::I64(i32::MIN as i64));

        let truncate = Conversion::plan(ValueKind::F64, ValueKind::I32).unwrap();
        assert_eq!(truncate.apply(Value::F64(2.9)).unwrap(), Value::I32(2));
    }

    #[test]
    fn test_apply_unbox_checks_value() {
        let unbox = Conversion::Unbox(ValueKind::I32);
        assert_eq!(unbox.apply(Value::I32(4)).unwrap(), Value::I32(4));
        assert!(unbox.apply(Value::str("4")).is_err());
        assert!(unbox.apply(Value::Null).is_err());
        assert!(Conversion::Unbox(ValueKind::Str).apply(Value::Null).is_ok());
    }

    #[test]
    fn test_coerce_attempts() {
        let i32_ty = TypeRef::from(Primitive::I32);
        let str_ty = TypeRef::from(Primitive::String);
        let obj_ty = TypeRef::from(Primitive::Object);

        assert_eq!(coerce(&Value::I64(12), &i32_ty), Some(Value::I32(12)));
        assert_eq!(coerce(&Value::I64(i64::MAX), &i32_ty), None);
        assert_eq!(coerce(&Value::str(" 42 "), &i32_ty), Some(Value::I32(42)));
        assert_eq!(coerce(&Value::str("forty"), &i32_ty), None);
        assert_eq!(coerce(&Value::F64(2.5), &i32_ty), Some(Value::I32(2)));
        assert_eq!(coerce(&Value::F64(f64::NAN), &i32_ty), None);
        assert_eq!(coerce(&Value::I32(7), &str_ty), Some(Value::str("7")));
        assert_eq!(coerce(&Value::Null, &str_ty), Some(Value::Null));
        assert_eq!(coerce(&Value::Null, &i32_ty), None);
        assert_eq!(coerce(&Value::Bool(true), &obj_ty), Some(Value::Bool(true)));
    }

    #[test]
    fn test_reflected_round_trip_kinds() {
        assert_eq!(i32::from_value(Value::I32(-1)).unwrap(), -1);
        assert!(i32::from_value(Value::I64(1)).is_err());
        assert_eq!(String::from_value(Value::str("x")).unwrap(), "x");
        assert_eq!(Value::from_value(Value::Null).unwrap(), Value::Null);
        assert_eq!(<bool as Reflected>::KIND, ValueKind::Bool);
    }

    #[test]
    fn test_reflected_option_maps_null() {
        assert_eq!(<Option<String> as Reflected>::KIND, ValueKind::Str);
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(Value::str("ann")).unwrap(),
            Some("ann".to_string())
        );
        assert!(Option::<i32>::from_value(Value::str("1")).is_err());
        assert_eq!(None::<ObjectRef>.into_value(), Value::Null);
        assert_eq!(Some(7i64).into_value(), Value::I64(7));
    }
}
