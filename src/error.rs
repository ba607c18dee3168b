//! Error types for the Shrike library.
//!
//! All fallible operations return [`Result`], an alias over [`ShrikeError`].
//! The enum distinguishes recoverable index corruption (handled by the
//! startup recovery path) from caller mistakes and from unrecoverable
//! initialization failures.
//!
//! # Examples
//!
//! ```
//! use shrike::error::{Result, ShrikeError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(ShrikeError::invalid_argument("Invalid input"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use anyhow;
use thiserror::Error;

/// The main error type for Shrike operations.
///
/// Uses the `thiserror` crate for the `Error` trait implementation and
/// provides convenient constructor methods for the common variants.
#[derive(Error, Debug)]
pub enum ShrikeError {
    /// I/O errors (file operations, locking, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Index-related errors
    #[error("Index error: {0}")]
    Index(String),

    /// Index definition errors
    #[error("Schema error: {0}")]
    Schema(String),

    /// Analysis-related errors (tokenization, analyzer resolution, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Field materialization errors
    #[error("Field error: {0}")]
    Field(String),

    /// Errors raised by the segment engine underneath an index
    #[error("Engine error: {0}")]
    Engine(String),

    /// Operation attempted against an index that has been disposed
    #[error("Index '{0}' has been disposed")]
    IndexDisposed(String),

    /// Searcher acquisition attempted after the snapshot slot was retired
    #[error("Index '{0}' has been closed")]
    IndexClosed(String),

    /// An index could not be opened, and the forced reset did not help either
    #[error("Could not initialize index '{name}': {source}")]
    InitializationFailed {
        name: String,
        #[source]
        source: Box<ShrikeError>,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with ShrikeError.
pub type Result<T> = std::result::Result<T, ShrikeError>;

impl ShrikeError {
    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        ShrikeError::Index(msg.into())
    }

    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        ShrikeError::Schema(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        ShrikeError::Analysis(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        ShrikeError::Storage(msg.into())
    }

    /// Create a new field error.
    pub fn field<S: Into<String>>(msg: S) -> Self {
        ShrikeError::Field(msg.into())
    }

    /// Create a new engine error.
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        ShrikeError::Engine(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        ShrikeError::SerializationError(msg.into())
    }

    /// Create an error for an operation against a disposed index.
    pub fn disposed<S: Into<String>>(index_name: S) -> Self {
        ShrikeError::IndexDisposed(index_name.into())
    }

    /// Create an error for a searcher acquisition against a closed index.
    pub fn closed<S: Into<String>>(index_name: S) -> Self {
        ShrikeError::IndexClosed(index_name.into())
    }

    /// Wrap a cause into an initialization failure for the named index.
    pub fn initialization<S: Into<String>>(index_name: S, cause: ShrikeError) -> Self {
        ShrikeError::InitializationFailed {
            name: index_name.into(),
            source: Box::new(cause),
        }
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ShrikeError::Other(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        ShrikeError::Other(format!("Invalid argument: {}", msg.into()))
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        ShrikeError::Other(format!("Internal error: {}", msg.into()))
    }
}
