//! Curator error taxonomy.
//!
//! Every failure is classified into a category that drives the propagation
//! policy: `continue_if_exception` swallows everything except empty-list
//! conditions (governed solely by `ignore_empty_list`) and fatal errors.
//! Categories also map to the process exit codes.

use thiserror::Error;

/// Top-level curator errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed action file / config, schema violation, missing option
    #[error("Configuration error: {0}")]
    Config(String),

    /// No entities survived filtering
    #[error("Empty list: {0}")]
    EmptyList(String),

    /// Action-specific preflight failure
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Elasticsearch API failure
    #[error("Cluster error: {0}")]
    Cluster(#[from] curator_client::EsError),

    /// Object-store failure
    #[error("Object store error: {0}")]
    Aws(#[from] curator_storage::StorageError),

    /// Poll deadline exceeded
    #[error("Timed out after {waited}s waiting for {action}")]
    Timeout { action: String, waited: u64 },

    /// Could not acquire a repository lock within bounds
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// Invariant violation; aborts immediately
    #[error("Fatal: {0}")]
    Fatal(String),

    /// Malformed YAML input (config or action file)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed JSON input
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for curator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category, used by the propagation policy and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    EmptyList,
    Precondition,
    Cluster,
    Aws,
    Timeout,
    LockTimeout,
    Fatal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::Yaml(_) | Error::Json(_) => ErrorCategory::Config,
            Error::EmptyList(_) => ErrorCategory::EmptyList,
            Error::Precondition(_) => ErrorCategory::Precondition,
            Error::Cluster(_) => ErrorCategory::Cluster,
            Error::Aws(_) => ErrorCategory::Aws,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::LockTimeout(_) => ErrorCategory::LockTimeout,
            Error::Fatal(_) => ErrorCategory::Fatal,
        }
    }

    pub fn is_empty_list(&self) -> bool {
        self.category() == ErrorCategory::EmptyList
    }

    /// Whether `continue_if_exception` may swallow this error.
    pub fn is_continuable(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::EmptyList | ErrorCategory::Fatal
        )
    }

    /// Process exit code: 0 success, 1 empty-list, 2 action failure,
    /// 3 configuration error.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::EmptyList => 1,
            ErrorCategory::Config => 3,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_and_exit_codes() {
        assert_eq!(Error::Config("x".into()).exit_code(), 3);
        assert_eq!(Error::EmptyList("x".into()).exit_code(), 1);
        assert_eq!(Error::Precondition("x".into()).exit_code(), 2);
        assert_eq!(
            Error::Timeout { action: "snapshot".into(), waited: 30 }.exit_code(),
            2
        );
    }

    #[test]
    fn test_continuable_excludes_empty_list_and_fatal() {
        assert!(!Error::EmptyList("x".into()).is_continuable());
        assert!(!Error::Fatal("x".into()).is_continuable());
        assert!(Error::Precondition("x".into()).is_continuable());
        assert!(Error::Timeout { action: "a".into(), waited: 1 }.is_continuable());
        assert!(Error::LockTimeout("r".into()).is_continuable());
    }
}
