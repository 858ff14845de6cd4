//! Delegate shapes for bound invokers
//!
//! A shape fixes the Rust signature of the callable returned by
//! [`InvocationDispatcher::create_bound_invoker`](crate::InvocationDispatcher::create_bound_invoker).
//! Typed shapes declare their parameter and return kinds so conversions can
//! be planned when the invoker is bound; [`Dynamic`] accepts any arguments
//! and converts them on each call.

use std::marker::PhantomData;
use std::sync::Arc;

use mirror_types::{Reflected, Value, ValueKind};

use crate::error::ReflectResult;

/// Untyped call into a bound method: converted arguments in, converted
/// result out
pub type Invocation = Arc<dyn Fn(Vec<Value>) -> ReflectResult<Value> + Send + Sync>;

/// What a shape does with the method's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// Result is dropped; any return type is accepted
    Discard,
    /// Result is converted to this kind
    Value(ValueKind),
}

/// Signature of a bound invoker
pub trait DelegateShape: 'static {
    /// The callable handed to callers
    type Delegate: Clone + Send + Sync + 'static;

    /// Parameter kinds in order, `None` to accept any arguments
    fn parameters() -> Option<Vec<ValueKind>>;

    /// Treatment of the result
    fn returns() -> ReturnShape;

    /// Wrap an invocation into the typed callable
    fn wrap(invocation: Invocation) -> Self::Delegate;
}

/// Untyped shape: `Fn(&[Value]) -> ReflectResult<Value>`
pub struct Dynamic;

impl DelegateShape for Dynamic {
    type Delegate = Arc<dyn Fn(&[Value]) -> ReflectResult<Value> + Send + Sync>;

    fn parameters() -> Option<Vec<ValueKind>> {
        None
    }

    fn returns() -> ReturnShape {
        ReturnShape::Value(ValueKind::Any)
    }

    fn wrap(invocation: Invocation) -> Self::Delegate {
        Arc::new(move |args: &[Value]| invocation(args.to_vec()))
    }
}

/// `Fn() -> ReflectResult<()>`
pub struct Action0;

impl DelegateShape for Action0 {
    type Delegate = Arc<dyn Fn() -> ReflectResult<()> + Send + Sync>;

    fn parameters() -> Option<Vec<ValueKind>> {
        Some(Vec::new())
    }

    fn returns() -> ReturnShape {
        ReturnShape::Discard
    }

    fn wrap(invocation: Invocation) -> Self::Delegate {
        Arc::new(move || invocation(Vec::new()).map(drop))
    }
}

macro_rules! func_shape {
    ($(#[$doc:meta])* $name:ident; $($arg:ident $var:ident),*) => {
        $(#[$doc])*
        pub struct $name<$($arg,)* R>(PhantomData<fn($($arg),*) -> R>);

        impl<$($arg: Reflected,)* R: Reflected> DelegateShape for $name<$($arg,)* R> {
            type Delegate = Arc<dyn Fn($($arg),*) -> ReflectResult<R> + Send + Sync>;

            fn parameters() -> Option<Vec<ValueKind>> {
                Some(vec![$($arg::KIND),*])
            }

            fn returns() -> ReturnShape {
                ReturnShape::Value(R::KIND)
            }

            fn wrap(invocation: Invocation) -> Self::Delegate {
                Arc::new(move |$($var: $arg),*| -> ReflectResult<R> {
                    let result = invocation(vec![$($var.into_value()),*])?;
                    Ok(R::from_value(result)?)
                })
            }
        }
    };
}

macro_rules! action_shape {
    ($(#[$doc:meta])* $name:ident; $($arg:ident $var:ident),+) => {
        $(#[$doc])*
        pub struct $name<$($arg),+>(PhantomData<fn($($arg),+)>);

        impl<$($arg: Reflected),+> DelegateShape for $name<$($arg),+> {
            type Delegate = Arc<dyn Fn($($arg),+) -> ReflectResult<()> + Send + Sync>;

            fn parameters() -> Option<Vec<ValueKind>> {
                Some(vec![$($arg::KIND),+])
            }

            fn returns() -> ReturnShape {
                ReturnShape::Discard
            }

            fn wrap(invocation: Invocation) -> Self::Delegate {
                Arc::new(move |$($var: $arg),+| -> ReflectResult<()> {
                    invocation(vec![$($var.into_value()),+]).map(drop)
                })
            }
        }
    };
}

func_shape!(
    /// `Fn() -> ReflectResult<R>`
    Func0;
);
func_shape!(
    /// `Fn(A) -> ReflectResult<R>`
    Func1; A a
);
func_shape!(
    /// `Fn(A, B) -> ReflectResult<R>`
    Func2; A a, B b
);
func_shape!(
    /// `Fn(A, B, C) -> ReflectResult<R>`
    Func3; A a, B b, C c
);
action_shape!(
    /// `Fn(A) -> ReflectResult<()>`
    Action1; A a
);
action_shape!(
    /// `Fn(A, B) -> ReflectResult<()>`
    Action2; A a, B b
);

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_types::ObjectRef;

    fn echo() -> Invocation {
        Arc::new(|args: Vec<Value>| -> ReflectResult<Value> {
            Ok(args.into_iter().next().unwrap_or(Value::I32(-1)))
        })
    }

    #[test]
    fn test_declared_kinds() {
        assert_eq!(Func0::<i32>::parameters(), Some(vec![]));
        assert_eq!(
            Func2::<i64, String, bool>::parameters(),
            Some(vec![ValueKind::I64, ValueKind::Str])
        );
        assert_eq!(Func2::<i64, String, bool>::returns(), ReturnShape::Value(ValueKind::Bool));
        assert_eq!(
            Action1::<ObjectRef>::parameters(),
            Some(vec![ValueKind::Object])
        );
        assert_eq!(Action2::<i32, i32>::returns(), ReturnShape::Discard);
        assert_eq!(Dynamic::parameters(), None);
    }

    #[test]
    fn test_wrap_converts() {
        let f = Func1::<i32, i32>::wrap(echo());
        assert_eq!(f(7).unwrap(), 7);

        let g = Func0::<i32>::wrap(echo());
        assert_eq!(g().unwrap(), -1);

        let a = Action1::<String>::wrap(echo());
        a("ignored".to_string()).unwrap();

        let d = Dynamic::wrap(echo());
        assert_eq!(d(&[Value::Bool(true)]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_wrap_reports_result_mismatch() {
        let f = Func1::<String, i32>::wrap(echo());
        assert!(f("x".to_string()).is_err());
    }
}
