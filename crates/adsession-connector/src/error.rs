//! Directory error types
//!
//! Error definitions with transient/permanent classification for reconnect logic.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    // Connection errors (transient)
    /// Failed to dial the directory server, or the connection dropped.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    // Authentication errors (permanent)
    /// Bind rejected the supplied identity.
    #[error("authentication failed for '{dn}'")]
    AuthenticationFailed {
        dn: String,
        #[source]
        source: Option<BoxedSource>,
    },

    // Resolution errors
    /// A lookup that must be unique matched more than one entry.
    #[error("{count} entries matched '{filter}' under '{base_dn}', expected at most one")]
    AmbiguousResult {
        base_dn: String,
        filter: String,
        count: usize,
    },

    /// An operation required an existing entry that was not found.
    #[error("{kind} '{identifier}' not found")]
    NotFound {
        kind: &'static str,
        identifier: String,
    },

    /// Entry to add already exists.
    #[error("entry already exists: {dn}")]
    AlreadyExists { dn: String },

    // Request errors
    /// Malformed request.
    #[error("invalid request: {message}")]
    Validation { message: String },

    /// Client configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    // Reconnect errors
    /// The reconnect loop gave up.
    #[error("failed after {attempts} reconnect attempts: {last_error}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last_error: Box<DirectoryError>,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    // Operation errors
    /// A directory operation failed.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DirectoryError {
    /// Check if this error is transient and a reconnect may help.
    pub fn is_transient(&self) -> bool {
        matches!(self, DirectoryError::ConnectionFailed { .. })
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            DirectoryError::AuthenticationFailed { .. } => "AUTH_FAILED",
            DirectoryError::AmbiguousResult { .. } => "AMBIGUOUS_RESULT",
            DirectoryError::NotFound { .. } => "NOT_FOUND",
            DirectoryError::AlreadyExists { .. } => "ALREADY_EXISTS",
            DirectoryError::Validation { .. } => "VALIDATION",
            DirectoryError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            DirectoryError::ExhaustedRetries { .. } => "EXHAUSTED_RETRIES",
            DirectoryError::Cancelled => "CANCELLED",
            DirectoryError::OperationFailed { .. } => "OPERATION_FAILED",
            DirectoryError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an authentication failed error.
    pub fn auth_failed(dn: impl Into<String>) -> Self {
        DirectoryError::AuthenticationFailed {
            dn: dn.into(),
            source: None,
        }
    }

    /// Create an authentication failed error with source.
    pub fn auth_failed_with_source(
        dn: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::AuthenticationFailed {
            dn: dn.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed error with source.
    pub fn operation_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        DirectoryError::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(kind: &'static str, identifier: impl Into<String>) -> Self {
        DirectoryError::NotFound {
            kind,
            identifier: identifier.into(),
        }
    }

    /// Wrap this error with the operation it happened in.
    ///
    /// Connection failures stay connection failures so callers can still
    /// decide to reconnect; everything else that is not already a domain
    /// error becomes `OperationFailed` with this error as its source.
    #[must_use]
    pub fn context(self, message: impl Into<String>) -> Self {
        match self {
            DirectoryError::ConnectionFailed { .. } => {
                let message = message.into();
                DirectoryError::connection_failed_with_source(message, self)
            }
            DirectoryError::OperationFailed { .. } | DirectoryError::Internal { .. } => {
                DirectoryError::operation_failed_with_source(message, self)
            }
            other => other,
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
