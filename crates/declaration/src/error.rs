//! Error types for declaration loading and validation

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading a declaration
#[derive(Debug, Error)]
pub enum Error {
    /// The declaration file could not be read
    #[error("could not read declaration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading stdin failed
    #[error("could not read declaration from stdin: {0}")]
    Stdin(#[source] std::io::Error),

    /// TOML syntax or shape error
    #[error("invalid TOML declaration: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or shape error
    #[error("invalid JSON declaration: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown file extension
    #[error("unsupported declaration format: {0} (expected .toml or .json)")]
    UnsupportedFormat(String),

    /// The declaration parsed but is not valid
    #[error("invalid declaration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// Result type for declaration operations
pub type Result<T> = std::result::Result<T, Error>;
