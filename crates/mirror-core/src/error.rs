//! Error types for the reflection cache

use mirror_types::HostError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for reflection operations
pub type ReflectResult<T> = Result<T, ReflectError>;

/// Errors raised by the reflection cache.
///
/// A missing type or member is not an error; resolution returns `None`.
#[derive(Debug, Error)]
pub enum ReflectError {
    /// Invalid usage: empty names, illegal conversions, no matching overload,
    /// wrong receiver
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure raised by the invoked member or by the host while running a
    /// compiled closure, passed through as produced
    #[error(transparent)]
    Target(#[from] HostError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ReflectError {
    /// Create an invalid-argument error
    pub fn invalid(message: impl Into<String>) -> Self {
        ReflectError::InvalidArgument(message.into())
    }

    /// The host error raised by user code, if this is one
    pub fn target(&self) -> Option<&HostError> {
        match self {
            ReflectError::Target(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this is an invalid-argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ReflectError::InvalidArgument(_))
    }
}

/// Reject empty member or type names
pub(crate) fn require_name(name: &str, what: &str) -> ReflectResult<()> {
    if name.is_empty() {
        return Err(ReflectError::invalid(format!("{what} name must not be empty")));
    }
    Ok(())
}
