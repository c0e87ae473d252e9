//! Error types for the branch planner
//!
//! Errors are structured with fields to aid debugging in production. Every
//! failure coming back from the object store carries the kind, namespace and
//! name of the object it was about, so callers can log or retry without
//! re-deriving context.

use thiserror::Error;

use crate::ObjectKey;

/// Main error type for branch planner operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes client error outside of a specific object operation
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The object does not exist in the store
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind (e.g., "Terraform")
        kind: String,
        /// Object namespace
        namespace: String,
        /// Object name
        name: String,
    },

    /// A reference was rejected by the access-control policy
    #[error("access denied: {message}")]
    AccessDenied {
        /// Description of the denied reference
        message: String,
    },

    /// The primary resource points at a source kind that cannot be mirrored
    #[error("branch based planner does not support source kind: {kind}")]
    UnsupportedSourceKind {
        /// The offending source kind
        kind: String,
    },

    /// Optimistic-concurrency conflict or already-exists on create
    #[error("conflict on {kind} {namespace}/{name}: {message}")]
    Conflict {
        /// Resource kind
        kind: String,
        /// Object namespace
        namespace: String,
        /// Object name
        name: String,
        /// Message returned by the store
        message: String,
    },

    /// Any other store failure
    #[error("unable to {operation} {kind} {namespace}/{name}: {message}")]
    Store {
        /// Store operation (get, list, create, update, delete)
        operation: String,
        /// Resource kind
        kind: String,
        /// Object namespace
        namespace: String,
        /// Object name (empty for list)
        name: String,
        /// Description of what failed
        message: String,
        /// Whether the caller may retry
        retryable: bool,
    },

    /// An object already sits at a derived key but was not produced for this lineage
    #[error("refusing to adopt {kind} {namespace}/{name}: {message}")]
    NotOwned {
        /// Resource kind
        kind: String,
        /// Object namespace
        namespace: String,
        /// Object name
        name: String,
        /// Why ownership could not be established
        message: String,
    },

    /// Validation error for caller input or object specs
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.sourceRef.name")
        field: Option<String>,
    },

    /// The operation was cancelled before it completed
    #[error("{operation} cancelled")]
    Cancelled {
        /// Operation that was interrupted
        operation: String,
    },
}

impl Error {
    /// Create a not-found error for the given object
    pub fn not_found(kind: impl Into<String>, key: &ObjectKey) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        }
    }

    /// Create an access-denied error
    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: msg.into(),
        }
    }

    /// Create a conflict error for the given object
    pub fn conflict(kind: impl Into<String>, key: &ObjectKey, msg: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            message: msg.into(),
        }
    }

    /// Create a retryable store error
    pub fn store(
        operation: impl Into<String>,
        kind: impl Into<String>,
        key: &ObjectKey,
        msg: impl Into<String>,
    ) -> Self {
        Self::Store {
            operation: operation.into(),
            kind: kind.into(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create a non-retryable store error (e.g., the store rejected the object)
    pub fn store_permanent(
        operation: impl Into<String>,
        kind: impl Into<String>,
        key: &ObjectKey,
        msg: impl Into<String>,
    ) -> Self {
        Self::Store {
            operation: operation.into(),
            kind: kind.into(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            message: msg.into(),
            retryable: false,
        }
    }

    /// Create an ownership error for an object at a derived key
    pub fn not_owned(kind: impl Into<String>, key: &ObjectKey, msg: impl Into<String>) -> Self {
        Self::NotOwned {
            kind: kind.into(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            message: msg.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with a field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a cancellation error for the given operation
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Translate a kube-rs error from an object operation.
    ///
    /// 404 becomes [`Error::NotFound`], 409 becomes [`Error::Conflict`], other
    /// 4xx responses are permanent and everything else (5xx, transport) is
    /// retryable.
    pub fn from_kube(operation: &str, kind: &str, key: &ObjectKey, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::not_found(kind, key),
            kube::Error::Api(ae) if ae.code == 409 => Self::conflict(kind, key, ae.message),
            kube::Error::Api(ae) if (400..500).contains(&ae.code) => {
                Self::store_permanent(operation, kind, key, ae.message)
            }
            other => Self::store(operation, kind, key, other.to_string()),
        }
    }

    /// Check if this error is retryable
    ///
    /// Conflicts and transient store failures are retryable by the caller.
    /// Policy, validation and ownership failures need a config fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::NotFound { .. } => false,
            Error::AccessDenied { .. } => false,
            Error::UnsupportedSourceKind { .. } => false,
            Error::Conflict { .. } => true,
            Error::Store { retryable, .. } => *retryable,
            Error::NotOwned { .. } => false,
            Error::Validation { .. } => false,
            Error::Cancelled { .. } => false,
        }
    }

    /// Check if this error means the object is absent
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Kube { source } => matches!(source, kube::Error::Api(ae) if ae.code == 404),
            _ => false,
        }
    }

    /// Get the object key if this error is about a specific object
    pub fn object(&self) -> Option<ObjectKey> {
        match self {
            Error::NotFound {
                namespace, name, ..
            }
            | Error::Conflict {
                namespace, name, ..
            }
            | Error::Store {
                namespace, name, ..
            }
            | Error::NotOwned {
                namespace, name, ..
            } => Some(ObjectKey::new(namespace.clone(), name.clone())),
            _ => None,
        }
    }

    /// Get the resource kind if this error is about a specific object
    pub fn kind(&self) -> Option<&str> {
        match self {
            Error::NotFound { kind, .. }
            | Error::Conflict { kind, .. }
            | Error::Store { kind, .. }
            | Error::NotOwned { kind, .. }
            | Error::UnsupportedSourceKind { kind } => Some(kind),
            _ => None,
        }
    }
}
