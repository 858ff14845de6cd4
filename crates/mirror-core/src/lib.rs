//! Mirror reflection cache
//!
//! Cached, thread-safe reflection over a [`mirror_types::Universe`]:
//! - Type lookup by fully-qualified name, misses included
//! - Member metadata keyed by owner, name, binding flags and signature
//! - Compiled typed getters and setters
//! - Method invocation with overload selection, instance factories and
//!   bound invokers
//! - Attribute queries with optional inheritance
//!
//! Every cache lives in one generation owned by a [`Reflector`]; clearing
//! swaps in a fresh generation at once.
//!
//! # Example
//!
//! ```ignore
//! use mirror_core::{Receiver, Reflector};
//!
//! let reflector = Reflector::new(universe);
//! let calc = reflector.resolve_type("math.Calculator").unwrap();
//! let obj = reflector.create_instance(&calc, &[])?;
//! let sum = reflector.invoke(&Receiver::from(obj.as_object().unwrap()), "Add", &[1.into(), 2.into()])?;
//! ```

#![warn(missing_docs)]

pub mod accessors;
pub mod attributes;
pub mod config;
pub mod delegate;
pub mod error;
pub mod invoke;
pub mod key;
pub mod members;
pub mod reflector;
pub mod stats;
pub mod types;

pub use accessors::{AccessorCompiler, Getter, Setter};
pub use attributes::{AttributeInspector, AttributeTarget};
pub use config::{ConfigError, ReflectorConfig};
pub use delegate::{
    Action0, Action1, Action2, DelegateShape, Dynamic, Func0, Func1, Func2, Func3, Invocation,
    ReturnShape,
};
pub use error::{ReflectError, ReflectResult};
pub use invoke::{Factory, InvocationDispatcher, Receiver};
pub use key::{AccessorKey, Binding, InvokerKey, MemberKey, MemberKind, Signature};
pub use members::{MemberDescriptor, MemberMetadataCache};
pub use reflector::Reflector;
pub use stats::{CacheCounter, CacheStat, CacheStats};
pub use types::TypeRegistry;

pub use mirror_types;
