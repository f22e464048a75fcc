//! Elasticsearch client error types.

use thiserror::Error;

/// Errors surfaced by the Elasticsearch adapter.
#[derive(Error, Debug)]
pub enum EsError {
    /// Transport-level failure (connection refused, TLS, timeout)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx API response with a parsed reason
    #[error("Elasticsearch API error ({status}): {reason}")]
    Api { status: u16, reason: String },

    /// 404 for a named resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// 401/403 from the cluster
    #[error("Authentication failed (HTTP {0})")]
    Auth(u16),

    /// Client misconfiguration (bad hosts, cloud_id, TLS material)
    #[error("Client configuration error: {0}")]
    Config(String),

    /// Payload did not deserialize into the expected shape
    #[error("Unexpected response body: {0}")]
    Json(#[from] serde_json::Error),

    /// URL construction failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, EsError>;

impl EsError {
    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EsError::NotFound(_))
            || matches!(self, EsError::Api { status: 404, .. })
    }

    /// Check if the cluster rejected the request with a conflict (409).
    pub fn is_conflict(&self) -> bool {
        matches!(self, EsError::Api { status: 409, .. })
    }

    /// Check whether the reason text names a given Elasticsearch error type.
    pub fn reason_contains(&self, needle: &str) -> bool {
        matches!(self, EsError::Api { reason, .. } if reason.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(EsError::NotFound("idx".to_string()).is_not_found());
        assert!(EsError::Api { status: 404, reason: "no such index".into() }.is_not_found());
        assert!(!EsError::Api { status: 500, reason: "boom".into() }.is_not_found());
    }

    #[test]
    fn test_is_conflict() {
        let err = EsError::Api { status: 409, reason: "snapshot_in_progress_exception".into() };
        assert!(err.is_conflict());
        assert!(err.reason_contains("snapshot_in_progress"));
    }
}
