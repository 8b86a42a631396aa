//! Error types for Stash
//!
//! Errors carry enough context to be surfaced verbatim in a status condition
//! message. Each variant also answers whether the outer control loop should
//! retry the operation.

use thiserror::Error;

use crate::kind::JobKind;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Stash operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Malformed or contradictory request input, detected before any write
    #[error("configuration error{}: {message}", at_field(.field))]
    Configuration {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.backend.s3.bucket")
        field: Option<String>,
    },

    /// The store rejected a write because the object changed concurrently
    #[error("conflict: {message}")]
    Conflict {
        /// Message returned by the store
        message: String,
    },

    /// A generic job payload did not carry the expected kind
    #[error("expected a {expected} object, got {actual}")]
    KindMismatch {
        /// Kind the executor was built for
        expected: JobKind,
        /// Kind found on the payload
        actual: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Internal invariant violation
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "identity", "mutator")
        context: String,
    },
}

fn at_field(field: &Option<String>) -> String {
    field
        .as_deref()
        .map(|f| format!(" at {f}"))
        .unwrap_or_default()
}

impl Error {
    /// Create a configuration error with the given message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a configuration error pointing at a field path
    pub fn configuration_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a conflict error with the given message
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict {
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Map a kube error, turning optimistic-concurrency rejections into [`Error::Conflict`]
    pub fn from_store(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict {
                message: ae.message,
            },
            other => Self::Kube { source: other },
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration, kind and serialization errors need a spec fix.
    /// Conflicts are always worth another attempt with a fresh read.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Configuration { .. } => false,
            Error::Conflict { .. } => true,
            Error::KindMismatch { .. } => false,
            Error::Serialization { .. } => false,
            Error::Cancelled => true,
            Error::Internal { .. } => true,
        }
    }
}
