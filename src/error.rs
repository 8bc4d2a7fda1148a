// src/error.rs

use thiserror::Error;

/// Core error types for Sift
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed dependency, version or package-id text
    #[error("Parse error: {0}")]
    Parse(String),

    /// A backing store failed to supply package data
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Lookup miss for a package or repository
    #[error("Not found: {0}")]
    NotFound(String),

    /// A requirement could not be satisfied from any store
    #[error("nothing provides '{depend}' required by {requirer}")]
    UnresolvedDepend {
        /// Package id of the package that carries the requirement
        requirer: String,
        /// Rendered description of the unsatisfied dependency
        depend: String,
    },

    /// Two packages in the transaction cannot coexist
    #[error("package {package} conflicts with {conflicts_with}")]
    Conflict {
        package: String,
        conflicts_with: String,
    },

    /// Resolution did not converge within the iteration cap
    #[error("resolution did not converge after {0} passes")]
    NotConverged(u32),

    /// Programming-contract violation (double-set field, step overrun)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The operation was cancelled by the caller
    #[error("operation was cancelled")]
    Cancelled,

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Download or HTTP failure
    #[error("Download error: {0}")]
    Download(String),

    /// Downloaded artifact does not match its expected checksum
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Configuration file problems
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using Sift's Error type
pub type Result<T> = std::result::Result<T, Error>;
