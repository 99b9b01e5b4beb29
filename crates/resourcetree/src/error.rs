//! Error types for tree operations

use crate::types::ResourceNodeType;
use thiserror::Error;

/// Error returned by a state refresher
pub type RefreshError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while working with resource trees
#[derive(Error, Debug)]
pub enum TreeError {
    /// Two trees that must share a shape do not
    #[error("tree shape mismatch at {path}: {reason}")]
    ShapeMismatch { path: String, reason: String },

    /// A state refresher failed; the node state was left untouched
    #[error("refreshing state of {node}: {source}")]
    Refresh {
        node: ResourceNodeType,
        #[source]
        source: RefreshError,
    },

    /// A state refresher reported `Noop`, which only diffing may produce
    #[error("state refresher for {node} returned noop")]
    InvalidRefresh { node: ResourceNodeType },
}

/// Result type for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;
