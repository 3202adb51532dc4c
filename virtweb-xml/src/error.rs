//! Error types for the configuration document model.

use thiserror::Error;

/// Errors that can occur while parsing or mutating a configuration document.
#[derive(Error, Debug)]
pub enum XmlError {
    /// The document could not be tokenized at all.
    #[error("Failed to parse document: {0}")]
    Parse(String),

    /// The document parsed but a structurally required element is missing.
    #[error("Malformed document structure: {0}")]
    Structure(String),

    /// The document tree could not be written back to a string.
    #[error("Failed to serialize document: {0}")]
    Serialize(String),
}

/// Result type alias for document model operations.
pub type Result<T> = std::result::Result<T, XmlError>;
