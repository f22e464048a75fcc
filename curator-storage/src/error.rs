//! Object-store error types.

use thiserror::Error;

/// Errors surfaced by the object-store adapter.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Bucket or object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider rejected or failed the request
    #[error("Object store request failed: {0}")]
    Request(String),

    /// Adapter misconfiguration
    #[error("Object store configuration error: {0}")]
    Config(String),

    /// The object is in a state that forbids the operation (e.g. archived
    /// and not yet restored)
    #[error("Invalid object state: {0}")]
    InvalidState(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::NotFound("bucket/key".to_string());
        assert_eq!(err.to_string(), "Not found: bucket/key");
        assert!(err.is_not_found());
    }
}
