//! Common error types used throughout stockroom.
//!
//! Read paths report a missing record as `Ok(None)`; `NotFound` is reserved
//! for writes that target a record which does not exist.

/// Common error type for stockroom.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required input was missing or malformed. Raised before any mutation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A write referenced a record that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The storage backend failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be serialized or parsed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Image data could not be decoded or encoded.
    #[error("Image error: {0}")]
    Image(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a new Image error.
    pub fn image<S: Into<String>>(msg: S) -> Self {
        Self::Image(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was raised by input validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
