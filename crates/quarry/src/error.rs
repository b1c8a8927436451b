//! Error types for quarry

use thiserror::Error;

/// Result type alias for quarry operations
pub type QbResult<T> = Result<T, QbError>;

/// Error types for query building and execution
#[derive(Debug, Error)]
pub enum QbError {
    /// Malformed or missing argument to a builder method
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The accumulated state cannot be compiled into a statement
    #[error("Compile error: {0}")]
    Compile(String),

    /// The target dialect cannot express the request
    #[error("Unsupported by dialect: {0}")]
    Unsupported(String),

    /// Error reported by the connection adapter
    #[error("Execution error: {0}")]
    Execution(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl QbError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a compile error
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }

    /// Create an unsupported-by-dialect error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Check if this is an invalid argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Check if this is a compile error
    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Compile(_))
    }

    /// Check if this is an execution error
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool::managed::PoolError<QbError>> for QbError {
    fn from(err: deadpool::managed::PoolError<QbError>) -> Self {
        match err {
            deadpool::managed::PoolError::Backend(e) => e,
            other => Self::Pool(other.to_string()),
        }
    }
}
