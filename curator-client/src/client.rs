//! The Elasticsearch HTTP client.
//!
//! A thin, cheaply-clonable wrapper over `reqwest` that owns request
//! building, authentication headers, error triage, and the per-request
//! timeout override every action may carry.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::config::{AuthMethod, ConnectionConfig};
use crate::error::{EsError, Result};

/// Typed wrapper over the Elasticsearch REST API surface curator uses.
#[derive(Clone)]
pub struct EsClient {
    http: reqwest::Client,
    base: Url,
    request_timeout: Duration,
}

impl std::fmt::Debug for EsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsClient")
            .field("base", &self.base.as_str())
            .finish()
    }
}

impl EsClient {
    /// Build a client from connection configuration.
    ///
    /// Requests go to the first configured endpoint; `master_only` setups
    /// are restricted to a single host at config validation time.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let endpoints = config.endpoints()?;
        let base = endpoints[0].clone();

        let mut headers = HeaderMap::new();
        match config.auth()? {
            AuthMethod::None => {}
            AuthMethod::Basic { user, password } => {
                use base64::Engine;
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", user, password));
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Basic {}", credentials))
                        .map_err(|e| EsError::Config(e.to_string()))?,
                );
            }
            AuthMethod::ApiKeyPair { id, api_key } => {
                use base64::Engine;
                let token = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", id, api_key));
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("ApiKey {}", token))
                        .map_err(|e| EsError::Config(e.to_string()))?,
                );
            }
            AuthMethod::ApiKeyToken(token) => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("ApiKey {}", token))
                        .map_err(|e| EsError::Config(e.to_string()))?,
                );
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);

        if !config.verify_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca) = &config.ca_certs {
            let pem = std::fs::read(ca)
                .map_err(|e| EsError::Config(format!("ca_certs {}: {}", ca.display(), e)))?;
            builder = builder.add_root_certificate(
                reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| EsError::Config(e.to_string()))?,
            );
        }
        if let (Some(cert), Some(key)) = (&config.client_cert, &config.client_key) {
            let mut pem = std::fs::read(cert)
                .map_err(|e| EsError::Config(format!("client_cert {}: {}", cert.display(), e)))?;
            let key_pem = std::fs::read(key)
                .map_err(|e| EsError::Config(format!("client_key {}: {}", key.display(), e)))?;
            pem.extend_from_slice(&key_pem);
            builder = builder.identity(
                reqwest::Identity::from_pem(&pem).map_err(|e| EsError::Config(e.to_string()))?,
            );
        }

        Ok(Self {
            http: builder.build()?,
            base,
            request_timeout: Duration::from_secs(config.request_timeout),
        })
    }

    /// Build a client pointed at a bare URL with default settings.
    ///
    /// Used by tests and by tools that already hold a resolved endpoint.
    pub fn for_url(url: &str) -> Result<Self> {
        let config = ConnectionConfig {
            hosts: vec![url.to_string()],
            ..Default::default()
        };
        Self::new(&config)
    }

    /// The configured per-request timeout, in seconds.
    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout.as_secs()
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    /// Issue a request and return the decoded JSON body.
    ///
    /// `timeout_override` (seconds) replaces the configured request timeout
    /// for this call only; long-running synchronous APIs need it.
    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        timeout_override: Option<u64>,
    ) -> Result<T> {
        let url = self.url(path)?;
        trace!(%url, %method, "elasticsearch request");

        let timeout = timeout_override
            .map(Duration::from_secs)
            .unwrap_or(self.request_timeout);

        let mut req = self
            .http
            .request(method, url)
            .timeout(timeout)
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(EsError::Auth(status.as_u16()));
        }

        if !status.is_success() {
            let reason = extract_reason(&response.text().await.unwrap_or_default());
            debug!(status = status.as_u16(), %reason, "elasticsearch error response");
            return Err(EsError::Api {
                status: status.as_u16(),
                reason,
            });
        }

        let text = response.text().await?;
        if text.is_empty() {
            // Some APIs (HEAD-alikes) return an empty body on success.
            return Ok(serde_json::from_value(Value::Object(Default::default()))?);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.request(Method::GET, path, query, None, None).await
    }

    /// Probe whether the connected node is the elected master.
    pub async fn is_elected_master(&self) -> Result<bool> {
        let local: Value = self.get("_nodes/_local", &[]).await?;
        let local_id = local
            .get("nodes")
            .and_then(Value::as_object)
            .and_then(|nodes| nodes.keys().next().cloned())
            .ok_or_else(|| EsError::Api {
                status: 500,
                reason: "could not determine local node id".to_string(),
            })?;

        let state: Value = self.get("_cluster/state/master_node", &[]).await?;
        let master_id = state
            .get("master_node")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(local_id == master_id)
    }
}

/// Pull the human-readable reason out of an ES error body, falling back to
/// the raw text when it is not the standard error envelope.
fn extract_reason(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(reason) = value
            .get("error")
            .and_then(|e| e.get("reason"))
            .and_then(Value::as_str)
        {
            let kind = value
                .get("error")
                .and_then(|e| e.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("error");
            return format!("{}: {}", kind, reason);
        }
        if let Some(reason) = value.get("error").and_then(Value::as_str) {
            return reason.to_string();
        }
    }
    if body.is_empty() {
        "no response body".to_string()
    } else {
        body.chars().take(512).collect()
    }
}

/// Join index names into comma-separated groups below `limit` bytes each.
///
/// Multi-index APIs take the names in the URL path; very large actionable
/// lists have to be split to stay under proxy and server line limits.
pub fn chunk_names(names: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for name in names {
        if !current.is_empty() && current.len() + name.len() + 1 > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(',');
        }
        current.push_str(name);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Default chunk limit for comma-joined index names.
pub const NAME_CHUNK_LIMIT: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_reason_standard_envelope() {
        let body = r#"{"error":{"type":"index_not_found_exception","reason":"no such index [x]"},"status":404}"#;
        assert_eq!(
            extract_reason(body),
            "index_not_found_exception: no such index [x]"
        );
    }

    #[test]
    fn test_extract_reason_plain_text() {
        assert_eq!(extract_reason("gateway timeout"), "gateway timeout");
        assert_eq!(extract_reason(""), "no response body");
    }

    #[test]
    fn test_chunk_names_splits_below_limit() {
        let names: Vec<String> = (0..10).map(|i| format!("index-{:04}", i)).collect();
        let chunks = chunk_names(&names, 32);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 32);
        }
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split(',')).collect();
        assert_eq!(rejoined.len(), names.len());
    }

    #[test]
    fn test_chunk_names_single_chunk() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(chunk_names(&names, 4096), vec!["a,b".to_string()]);
    }
}
