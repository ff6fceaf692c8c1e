//! Error types for the sitepack library
//!
//! This module defines all error types that can occur during snapshot and
//! restore operations. The taxonomy distinguishes errors that abort an
//! operation (the archive cannot be created, the container is unreadable,
//! no import source was supplied) from errors that are recovered locally
//! (a single unreadable file, a single failing dump statement).

use thiserror::Error;

/// Type alias for Results in the sitepack library
pub type Result<T> = std::result::Result<T, SitepackError>;

/// Main error type for all sitepack operations
#[derive(Debug, Error)]
pub enum SitepackError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The archive container is unreadable or malformed
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// An entry name was added to an archive twice
    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),

    /// A requested entry, backup or table does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database errors that prevent establishing an operation
    /// (cannot open the connection, cannot enumerate tables)
    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// One dump statement failed against the database
    ///
    /// These are recovered locally during a load; the failing statement is
    /// recorded and execution continues with the next statement.
    #[error("Statement failed: {message}")]
    Statement {
        /// The full statement text that failed
        statement: String,
        /// The database error message
        message: String,
    },

    /// Missing or invalid required input, e.g. no import source supplied
    #[error("Validation error: {0}")]
    Validation(String),

    /// An archive entry name escapes the application root or is malformed
    #[error("Invalid archive entry name: {0}")]
    InvalidEntryName(String),

    /// The environment descriptor entry could not be parsed
    #[error("Invalid environment descriptor: {0}")]
    InvalidDescriptor(String),
}

impl From<zip::result::ZipError> for SitepackError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => SitepackError::Io(e),
            zip::result::ZipError::FileNotFound => {
                SitepackError::NotFound("archive entry".to_string())
            }
            other => SitepackError::CorruptArchive(other.to_string()),
        }
    }
}

impl SitepackError {
    /// Create a validation error with a custom message
    pub fn validation(msg: impl Into<String>) -> Self {
        SitepackError::Validation(msg.into())
    }

    /// Create a not-found error with a custom message
    pub fn not_found(msg: impl Into<String>) -> Self {
        SitepackError::NotFound(msg.into())
    }

    /// Create a corrupt-archive error with a custom message
    pub fn corrupt(msg: impl Into<String>) -> Self {
        SitepackError::CorruptArchive(msg.into())
    }

    /// Check if this error is recovered locally during a run
    ///
    /// Recoverable errors are logged and the offending item is skipped;
    /// everything else aborts the operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SitepackError::Statement { .. }
                | SitepackError::InvalidEntryName(_)
                | SitepackError::Io(_)
        )
    }
}
