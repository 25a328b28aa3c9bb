//! Error types for vecstore.

use thiserror::Error;

/// Boxed error produced by a storage engine driver.
pub type BackendSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for vecstore operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in vector collection operations.
///
/// Absence of a record is never an error: lookups return `Option`.
#[derive(Debug, Error)]
pub enum StoreError {
    // ========================================================================
    // Caller errors (raised before any I/O)
    // ========================================================================
    /// A required input was empty or malformed.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The backend has no meaningful translation for this operation.
    #[error("Operation '{operation}' is not supported by the {backend} backend")]
    Unsupported {
        operation: &'static str,
        backend: &'static str,
    },

    // ========================================================================
    // Engine errors
    // ========================================================================
    /// Native driver or engine failure, passed through untouched.
    ///
    /// The original error is kept as the source and can be recovered with
    /// [`StoreError::backend_source`].
    #[error("{backend} backend error: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: BackendSource,
    },

    // ========================================================================
    // General errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StoreError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: &'static str, backend: &'static str) -> Self {
        Self::Unsupported { operation, backend }
    }

    /// Wrap a native engine error.
    pub fn backend(backend: &'static str, source: impl Into<BackendSource>) -> Self {
        Self::Backend {
            backend,
            source: source.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error was raised by input validation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Whether this error reports an unsupported operation.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Borrow the native engine error, if this is a backend failure.
    pub fn backend_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Backend { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
