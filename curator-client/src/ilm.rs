//! ILM policy operations.
//!
//! Policy bodies are cluster-defined JSON documents; they stay as
//! `serde_json::Value` here, with the typed accessors the deepfreeze
//! rotation logic needs (repository references, delete-phase flags) layered
//! on a thin wrapper.

use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::{json, Value};

use crate::client::EsClient;
use crate::error::Result;

/// One ILM policy as stored in the cluster.
#[derive(Debug, Clone)]
pub struct IlmPolicy {
    pub name: String,
    /// The `policy` object: `{"phases": {...}}`
    pub policy: Value,
}

impl IlmPolicy {
    /// Repositories referenced by `searchable_snapshot` actions in any phase.
    pub fn referenced_repositories(&self) -> Vec<String> {
        let mut repos = Vec::new();
        if let Some(phases) = self.policy.get("phases").and_then(Value::as_object) {
            for phase in phases.values() {
                if let Some(repo) = phase
                    .pointer("/actions/searchable_snapshot/snapshot_repository")
                    .and_then(Value::as_str)
                {
                    repos.push(repo.to_string());
                }
            }
        }
        repos
    }

    /// A copy of this policy with every `searchable_snapshot` repository
    /// reference replaced.
    pub fn with_repository(&self, name: String, repository: &str) -> IlmPolicy {
        let mut policy = self.policy.clone();
        if let Some(phases) = policy.get_mut("phases").and_then(Value::as_object_mut) {
            for phase in phases.values_mut() {
                if let Some(target) = phase
                    .pointer_mut("/actions/searchable_snapshot/snapshot_repository")
                {
                    *target = json!(repository);
                }
            }
        }
        IlmPolicy { name, policy }
    }

    /// Whether a delete phase would also delete the searchable snapshot.
    pub fn deletes_searchable_snapshot(&self) -> bool {
        self.policy
            .pointer("/phases/delete/actions/delete/delete_searchable_snapshot")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl EsClient {
    /// Fetch all ILM policies.
    pub async fn get_ilm_policies(&self) -> Result<BTreeMap<String, IlmPolicy>> {
        let value: Value = self.get("_ilm/policy", &[]).await?;
        let mut policies = BTreeMap::new();
        if let Some(map) = value.as_object() {
            for (name, entry) in map {
                let policy = entry.get("policy").cloned().unwrap_or(Value::Null);
                policies.insert(
                    name.clone(),
                    IlmPolicy {
                        name: name.clone(),
                        policy,
                    },
                );
            }
        }
        Ok(policies)
    }

    /// Fetch one ILM policy, `None` when absent.
    pub async fn get_ilm_policy(&self, name: &str) -> Result<Option<IlmPolicy>> {
        let result: Result<Value> = self.get(&format!("_ilm/policy/{}", name), &[]).await;
        match result {
            Ok(value) => Ok(value
                .get(name)
                .and_then(|entry| entry.get("policy"))
                .map(|policy| IlmPolicy {
                    name: name.to_string(),
                    policy: policy.clone(),
                })),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create or replace an ILM policy.
    pub async fn put_ilm_policy(&self, policy: &IlmPolicy) -> Result<()> {
        let body = json!({ "policy": policy.policy });
        let _: Value = self
            .request(
                Method::PUT,
                &format!("_ilm/policy/{}", policy.name),
                &[],
                Some(&body),
                None,
            )
            .await?;
        Ok(())
    }

    /// Delete an ILM policy; absent policies are treated as deleted.
    pub async fn delete_ilm_policy(&self, name: &str) -> Result<()> {
        let result: Result<Value> = self
            .request(
                Method::DELETE,
                &format!("_ilm/policy/{}", name),
                &[],
                None,
                None,
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_policy() -> IlmPolicy {
        IlmPolicy {
            name: "logs".to_string(),
            policy: json!({
                "phases": {
                    "hot": { "actions": { "rollover": { "max_size": "50gb" } } },
                    "cold": {
                        "min_age": "30d",
                        "actions": {
                            "searchable_snapshot": {
                                "snapshot_repository": "deepfreeze-000006"
                            }
                        }
                    },
                    "delete": {
                        "min_age": "90d",
                        "actions": { "delete": { "delete_searchable_snapshot": true } }
                    }
                }
            }),
        }
    }

    #[test]
    fn test_referenced_repositories() {
        let policy = sample_policy();
        assert_eq!(
            policy.referenced_repositories(),
            vec!["deepfreeze-000006".to_string()]
        );
    }

    #[test]
    fn test_with_repository_substitutes_without_mutating_source() {
        let policy = sample_policy();
        let copy = policy.with_repository("logs-000007".to_string(), "deepfreeze-000007");
        assert_eq!(
            copy.referenced_repositories(),
            vec!["deepfreeze-000007".to_string()]
        );
        // source untouched
        assert_eq!(
            policy.referenced_repositories(),
            vec!["deepfreeze-000006".to_string()]
        );
        // phases otherwise identical
        assert_eq!(
            copy.policy.pointer("/phases/hot"),
            policy.policy.pointer("/phases/hot")
        );
    }

    #[test]
    fn test_deletes_searchable_snapshot_flag() {
        assert!(sample_policy().deletes_searchable_snapshot());
        let plain = IlmPolicy {
            name: "p".to_string(),
            policy: json!({ "phases": { "delete": { "actions": { "delete": {} } } } }),
        };
        assert!(!plain.deletes_searchable_snapshot());
    }
}
