//! Connection configuration for the Elasticsearch adapter.
//!
//! Mirrors the `elasticsearch:` block of the curator configuration file:
//! `hosts` xor `cloud_id`, basic or API-key auth, TLS material, and the
//! per-request timeout.

use std::path::PathBuf;

use base64::Engine;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EsError, Result};

/// Authentication method for the cluster.
#[derive(Debug, Clone, Default)]
pub enum AuthMethod {
    #[default]
    None,
    Basic {
        user: String,
        password: String,
    },
    /// `id:api_key` pair, base64-encoded on the wire
    ApiKeyPair {
        id: String,
        api_key: String,
    },
    /// Pre-encoded API key token
    ApiKeyToken(String),
}

/// Connection settings, deserialized from the `elasticsearch:` config root.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub hosts: Vec<String>,
    pub cloud_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: ApiKeyConfig,
    pub ca_certs: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub verify_certs: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default)]
    pub master_only: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ApiKeyConfig {
    pub id: Option<String>,
    pub api_key: Option<String>,
    pub token: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

impl ConnectionConfig {
    /// Resolve the configured endpoints, decoding `cloud_id` if present.
    ///
    /// `hosts` and `cloud_id` are mutually exclusive; `master_only` is
    /// incompatible with multiple hosts.
    pub fn endpoints(&self) -> Result<Vec<Url>> {
        if !self.hosts.is_empty() && self.cloud_id.is_some() {
            return Err(EsError::Config(
                "hosts and cloud_id are mutually exclusive".to_string(),
            ));
        }

        let urls = if let Some(cloud_id) = &self.cloud_id {
            vec![decode_cloud_id(cloud_id)?]
        } else if self.hosts.is_empty() {
            vec![Url::parse("http://127.0.0.1:9200")?]
        } else {
            self.hosts
                .iter()
                .map(|h| normalize_host(h))
                .collect::<Result<Vec<_>>>()?
        };

        if self.master_only && urls.len() > 1 {
            return Err(EsError::Config(
                "master_only is incompatible with multiple hosts".to_string(),
            ));
        }

        Ok(urls)
    }

    /// Resolve the configured authentication method.
    pub fn auth(&self) -> Result<AuthMethod> {
        if let Some(token) = &self.api_key.token {
            return Ok(AuthMethod::ApiKeyToken(token.clone()));
        }
        if let (Some(id), Some(key)) = (&self.api_key.id, &self.api_key.api_key) {
            return Ok(AuthMethod::ApiKeyPair {
                id: id.clone(),
                api_key: key.clone(),
            });
        }
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Ok(AuthMethod::Basic {
                user: user.clone(),
                password: password.clone(),
            }),
            (Some(_), None) | (None, Some(_)) => Err(EsError::Config(
                "username and password must be provided together".to_string(),
            )),
            (None, None) => Ok(AuthMethod::None),
        }
    }
}

/// Normalize a `http[s]://host[:port]` string; https without an explicit
/// port implies `:443` (the scheme default, so no rewrite is needed).
fn normalize_host(host: &str) -> Result<Url> {
    let url = Url::parse(host)?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(EsError::Config(format!(
                "unsupported scheme '{}' in host {}",
                other, host
            )))
        }
    }
    Ok(url)
}

/// Decode an Elastic Cloud `cloud_id` into its HTTPS endpoint.
///
/// Format: `label:base64(host$es_uuid$kibana_uuid)`, optionally with a
/// `host:port` in the first segment.
fn decode_cloud_id(cloud_id: &str) -> Result<Url> {
    let encoded = cloud_id
        .split_once(':')
        .map(|(_, enc)| enc)
        .unwrap_or(cloud_id);
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| EsError::Config(format!("invalid cloud_id: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| EsError::Config(format!("invalid cloud_id: {}", e)))?;

    let mut parts = decoded.split('$');
    let host = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EsError::Config("cloud_id is missing the host segment".to_string()))?;
    let es_uuid = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EsError::Config("cloud_id is missing the cluster segment".to_string()))?;

    let (hostname, port) = match host.split_once(':') {
        Some((h, p)) => (
            h,
            p.parse::<u16>()
                .map_err(|_| EsError::Config(format!("invalid cloud_id port: {}", p)))?,
        ),
        None => (host, 443),
    };

    Ok(Url::parse(&format!(
        "https://{}.{}:{}",
        es_uuid, hostname, port
    ))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_host_gets_default_port() {
        let url = normalize_host("https://es.example.com").unwrap();
        assert_eq!(url.port_or_known_default(), Some(443));
    }

    #[test]
    fn test_explicit_port_preserved() {
        let url = normalize_host("http://localhost:9201").unwrap();
        assert_eq!(url.port(), Some(9201));
    }

    #[test]
    fn test_hosts_and_cloud_id_conflict() {
        let config = ConnectionConfig {
            hosts: vec!["http://localhost:9200".to_string()],
            cloud_id: Some("x".to_string()),
            ..Default::default()
        };
        assert!(config.endpoints().is_err());
    }

    #[test]
    fn test_master_only_multi_host_rejected() {
        let config = ConnectionConfig {
            hosts: vec![
                "http://a:9200".to_string(),
                "http://b:9200".to_string(),
            ],
            master_only: true,
            ..Default::default()
        };
        assert!(config.endpoints().is_err());
    }

    #[test]
    fn test_decode_cloud_id() {
        // host$es_uuid$kibana_uuid
        let raw = "eu-west-1.aws.found.io$abc123$def456";
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        let cloud_id = format!("my-cluster:{}", encoded);
        let url = decode_cloud_id(&cloud_id).unwrap();
        assert_eq!(url.host_str(), Some("abc123.eu-west-1.aws.found.io"));
        assert_eq!(url.port_or_known_default(), Some(443));
    }

    #[test]
    fn test_decode_cloud_id_with_port() {
        let raw = "example.com:9243$esid$kbid";
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        let url = decode_cloud_id(&encoded).unwrap();
        assert_eq!(url.as_str(), "https://esid.example.com:9243/");
    }

    #[test]
    fn test_auth_api_key_token_wins() {
        let config = ConnectionConfig {
            username: Some("u".to_string()),
            password: Some("p".to_string()),
            api_key: ApiKeyConfig {
                token: Some("tok".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.auth().unwrap(), AuthMethod::ApiKeyToken(_)));
    }

    #[test]
    fn test_auth_incomplete_basic_rejected() {
        let config = ConnectionConfig {
            username: Some("u".to_string()),
            ..Default::default()
        };
        assert!(config.auth().is_err());
    }
}
