//! Error types for tasksync-core

use thiserror::Error;

/// Result type alias using tasksync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tasksync-core operations
///
/// Every error is scoped to the single round or request that produced it.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing required identifiers or malformed task data
    #[error("Validation error: {0}")]
    Validation(String),

    /// A task claims an owner other than the requesting user
    #[error("Ownership error: {0}")]
    Ownership(String),

    /// Unknown or unresolvable device
    #[error("Device error: {0}")]
    Device(String),

    /// Persistence failure reported by a store collaborator
    #[error("Store error: {0}")]
    Store(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Task not found for the requesting owner
    #[error("Task not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], used by transports to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Ownership,
    Device,
    NotFound,
    Store,
}

impl Error {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Serialization(_) => ErrorKind::Validation,
            Self::Ownership(_) => ErrorKind::Ownership,
            Self::Device(_) => ErrorKind::Device,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Store(_) | Self::Sqlite(_) | Self::Io(_) => ErrorKind::Store,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn ownership(message: impl Into<String>) -> Self {
        Self::Ownership(message.into())
    }

    pub fn device(message: impl Into<String>) -> Self {
        Self::Device(message.into())
    }
}
