//! Error types for reconciliation.
//!
//! Errors are categorized so the walk can decide what is fatal and so an
//! outer driver can decide whether re-running a synchronization makes sense.

use resourcetree::{ResourceKind, ResourceNodeType, TreeError};
use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The queried record does not exist
    NotFound,
    /// Transient failure, worth running again
    Timeout,
    /// Programming or wiring error: missing handler, mismatched trees
    Structural,
    /// The run was cancelled or hit its deadline
    Cancelled,
    /// Any other failure of a query or a service call
    Operation,
}

impl ErrorCategory {
    /// Whether this error category is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Resource not found",
            Self::Timeout => "Operation timed out",
            Self::Structural => "Invalid engine configuration",
            Self::Cancelled => "Cancelled",
            Self::Operation => "Operation failed",
        }
    }
}

/// Why a run stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Errors that can occur while building trees or reconciling nodes.
#[derive(Debug, Error)]
pub enum Error {
    /// A state query found nothing
    #[error("not found: {what}")]
    NotFound { what: String },

    /// A request or a wait did not finish in time
    #[error("timed out: {message}")]
    Timeout { message: String },

    /// No reconciler is registered for the node's kind
    #[error("no reconciler for type exists: {node}")]
    NoReconciler { node: ResourceNodeType },

    /// Tree structure or refresh failure
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A reconciler was used before its collaborators were injected
    #[error("{kind} reconciler used before {what} was set")]
    NotInjected {
        kind: ResourceKind,
        what: &'static str,
    },

    /// The run metadata does not carry what a reconciler needs
    #[error("{kind} reconciler: {message}")]
    InvalidMetadata { kind: ResourceKind, message: String },

    #[error("synchronization {0}")]
    Cancelled(CancelReason),

    /// The backend answered with an error status
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The backend could not be reached
    #[error("transport error: {0}")]
    Transport(String),

    /// Reading or writing recorded state failed
    #[error("state error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A failed operation, with what was being attempted
    #[error("{operation}: {source}")]
    Operation {
        operation: String,
        #[source]
        source: Box<Error>,
    },

    /// A node failed during the walk
    #[error("reconciling {node}: {source}")]
    Reconcile {
        node: ResourceNodeType,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category; wrappers report the category of their source.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::NoReconciler { .. }
            | Error::Tree(_)
            | Error::NotInjected { .. }
            | Error::InvalidMetadata { .. } => ErrorCategory::Structural,
            Error::Cancelled(_) => ErrorCategory::Cancelled,
            Error::Operation { source, .. } | Error::Reconcile { source, .. } => source.category(),
            _ => ErrorCategory::Operation,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the whole synchronization should be run again.
    pub fn requeue(&self) -> bool {
        self.is_retryable()
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Error::Timeout {
            message: message.into(),
        }
    }
}

/// Attach the attempted operation to an error.
pub trait OperationContext<T> {
    fn operation(self, operation: impl Into<String>) -> Result<T>;
}

impl<T> OperationContext<T> for Result<T> {
    fn operation(self, operation: impl Into<String>) -> Result<T> {
        self.map_err(|source| Error::Operation {
            operation: operation.into(),
            source: Box::new(source),
        })
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
