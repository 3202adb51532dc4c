//! Error types for the remote API boundary.

use thiserror::Error;

/// Errors surfaced by a hypervisor connection.
///
/// Remote failures carry only a message string; the console shows it as a
/// dismissible banner and the user re-triggers the action, there is no
/// automatic retry.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The remote call was rejected or timed out.
    #[error("Remote call failed: {0}")]
    CallFailed(String),

    /// The named resource does not exist on this connection.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A submitted configuration document was rejected.
    #[error("Invalid configuration document: {0}")]
    InvalidDocument(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for connection operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;
