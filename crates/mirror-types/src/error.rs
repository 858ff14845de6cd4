//! Error types for the host type model

use std::error::Error;
use std::sync::Arc;

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Failures raised by the host type model or by user code running inside it
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    /// Value did not have the expected kind
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Explicit conversion failed at runtime
    #[error("Invalid cast from {from} to {to}")]
    InvalidCast {
        /// Source type name
        from: String,
        /// Target type name
        to: String,
    },

    /// A module with this name is already loaded
    #[error("Module already loaded: {0}")]
    DuplicateModule(String),

    /// Failure raised by a method, constructor or property body
    #[error("{0}")]
    Fault(String),

    /// Arbitrary error raised by user code
    #[error(transparent)]
    User(Arc<dyn Error + Send + Sync>),
}

impl HostError {
    /// Wrap an error produced by user code
    pub fn user<E: Error + Send + Sync + 'static>(error: E) -> Self {
        HostError::User(Arc::new(error))
    }

    /// Create a fault with a message
    pub fn fault(message: impl Into<String>) -> Self {
        HostError::Fault(message.into())
    }
}

impl From<String> for HostError {
    fn from(s: String) -> Self {
        HostError::Fault(s)
    }
}

impl From<&str> for HostError {
    fn from(s: &str) -> Self {
        HostError::Fault(s.to_string())
    }
}
