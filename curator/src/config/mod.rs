//! Curator configuration: the YAML config file and action files.

pub mod env;

use std::path::Path;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use curator_client::ConnectionConfig;

use crate::actions::ActionSpec;
use crate::error::{Error, Result};

/// The curator configuration file: `elasticsearch:` and `logging:` roots.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CuratorConfig {
    #[serde(default)]
    pub elasticsearch: ConnectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    #[serde(default)]
    pub logfile: Option<String>,
    /// `default` (pretty) or `json`
    #[serde(default = "default_logformat")]
    pub logformat: String,
    /// Module prefixes to silence
    #[serde(default)]
    pub blacklist: Vec<String>,
}

fn default_loglevel() -> String {
    "INFO".to_string()
}

fn default_logformat() -> String {
    "default".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            loglevel: default_loglevel(),
            logfile: None,
            logformat: default_logformat(),
            blacklist: Vec::new(),
        }
    }
}

impl CuratorConfig {
    /// Load a config file, applying environment substitution first.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(content)?;
        env::substitute_process_env(&mut value);
        Ok(serde_yaml::from_value(value)?)
    }
}

/// A parsed action file: numbered actions in ascending id order.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionFile {
    pub actions: BTreeMap<u32, ActionSpec>,
}

impl ActionFile {
    /// Load an action file, applying environment substitution first.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(content)?;
        env::substitute_process_env(&mut value);
        let file: ActionFile = serde_yaml::from_value(value)?;
        if file.actions.is_empty() {
            return Err(Error::Config("action file declares no actions".to_string()));
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = CuratorConfig::parse(
            r#"
elasticsearch:
  hosts:
    - http://es01:9200
  username: elastic
  password: secret
  request_timeout: 60
logging:
  loglevel: DEBUG
  logformat: json
"#,
        )
        .unwrap();
        assert_eq!(config.elasticsearch.hosts, vec!["http://es01:9200"]);
        assert_eq!(config.elasticsearch.request_timeout, 60);
        assert_eq!(config.logging.loglevel, "DEBUG");
        assert_eq!(config.logging.logformat, "json");
    }

    #[test]
    fn test_defaults() {
        let config = CuratorConfig::parse("elasticsearch: {}\n").unwrap();
        assert!(config.elasticsearch.hosts.is_empty());
        assert_eq!(config.elasticsearch.request_timeout, 30);
        assert!(config.elasticsearch.verify_certs);
        assert_eq!(config.logging.loglevel, "INFO");
        assert_eq!(config.logging.logformat, "default");
    }

    #[test]
    fn test_action_file_ordering() {
        let file = ActionFile::parse(
            r#"
actions:
  2:
    action: open
    filters:
      - filtertype: none
  1:
    action: delete_indices
    options:
      ignore_empty_list: true
    filters:
      - filtertype: none
"#,
        )
        .unwrap();
        let names: Vec<&str> = file.actions.values().map(|a| a.name()).collect();
        // BTreeMap keys iterate ascending: 1 before 2.
        assert_eq!(names, vec!["delete_indices", "open"]);
    }

    #[test]
    fn test_empty_action_file_rejected() {
        assert!(ActionFile::parse("actions: {}\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curator.yml");
        std::fs::write(&path, "elasticsearch:\n  hosts:\n    - http://es01:9200\n").unwrap();
        let config = CuratorConfig::load(&path).unwrap();
        assert_eq!(config.elasticsearch.hosts, vec!["http://es01:9200"]);

        assert!(CuratorConfig::load(&dir.path().join("missing.yml")).is_err());
    }

    #[test]
    fn test_alias_action_sides() {
        let file = ActionFile::parse(
            r#"
actions:
  1:
    action: alias
    options:
      name: lastweek
    add:
      filters:
        - filtertype: pattern
          kind: prefix
          value: logstash-
    remove:
      filters:
        - filtertype: pattern
          kind: prefix
          value: logstash-
          exclude: true
"#,
        )
        .unwrap();
        assert_eq!(file.actions[&1].name(), "alias");
    }
}
