//! Error types for shiftlog-core

use thiserror::Error;

/// Result type alias using shiftlog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shiftlog-core operations
///
/// Delivery failures are not part of this enum: they are recorded on queue
/// items as [`crate::sync::TransportError`] and never reach callers.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input rejected before anything is persisted
    #[error("Validation error: {0}")]
    Validation(String),

    /// A durable read or write could not be completed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Whether this error means local data may not have been recorded.
    pub const fn is_persistence(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_not_a_persistence_failure() {
        assert!(!Error::validation("bad latitude").is_persistence());
        assert!(Error::persistence("disk full").is_persistence());
        assert!(Error::Io(std::io::Error::other("boom")).is_persistence());
    }
}
