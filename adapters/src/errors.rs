//! Custom error types specific to the `adapters` crate.
//!
//! This module defines errors that can occur while talking to the backend
//! (authentication, document store), the device (location, URI launching) or
//! local storage, providing a unified error type for every collaborator port.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// The backend rejected the supplied email/password pair.
    #[error("invalid credential")]
    InvalidCredential,

    #[error("no account registered for {0}")]
    UserNotFound(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("invalid document path: {0}")]
    InvalidPath(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdapterError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Unavailable(_) | AdapterError::Io(_))
    }
}
