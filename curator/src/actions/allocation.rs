//! Shard placement actions: allocation, cluster_routing, replicas.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::actions::waiter::{self, WaitOptions};
use crate::actions::{
    build_index_list, check_empty, log_dry_run, ActionContext, ActionOutcome, CommonOptions,
};
use crate::error::{Error, Result};
use crate::filter::FilterSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    pub key: String,
    /// Empty or absent value removes the setting
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "default_allocation_type")]
    pub allocation_type: String,
    #[serde(flatten)]
    pub wait: WaitOptions,
}

fn default_allocation_type() -> String {
    "require".to_string()
}

impl AllocationOptions {
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.allocation_type.as_str(), "require" | "include" | "exclude") {
            return Err(Error::Config(format!(
                "allocation_type must be require, include or exclude, got {}",
                self.allocation_type
            )));
        }
        self.wait.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRoutingOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    /// `allocation` or `rebalance`
    pub routing_type: String,
    pub value: String,
    #[serde(flatten)]
    pub wait: WaitOptions,
}

impl ClusterRoutingOptions {
    pub fn validate(&self) -> Result<()> {
        let allowed: &[&str] = match self.routing_type.as_str() {
            "allocation" => &["all", "primaries", "new_primaries", "none"],
            "rebalance" => &["all", "primaries", "replicas", "none"],
            other => {
                return Err(Error::Config(format!(
                    "routing_type must be allocation or rebalance, got {}",
                    other
                )))
            }
        };
        if !allowed.contains(&self.value.as_str()) {
            return Err(Error::Config(format!(
                "value {} is not valid for routing_type {}",
                self.value, self.routing_type
            )));
        }
        self.wait.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicasOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    pub count: u32,
    #[serde(flatten)]
    pub wait: WaitOptions,
}

impl ReplicasOptions {
    pub fn validate(&self) -> Result<()> {
        self.wait.validate()
    }
}

pub async fn run_allocation(
    options: &AllocationOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_index_list(ctx, &options.common, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "allocation")? {
        return Ok(outcome);
    }

    let names: Vec<String> = list.iter().map(|index| index.name.clone()).collect();
    let setting = format!(
        "index.routing.allocation.{}.{}",
        options.allocation_type, options.key
    );
    if ctx.dry_run {
        return Ok(log_dry_run(
            "allocation",
            &format!("set {} on", setting),
            &names,
        ));
    }

    let value = match options.value.as_deref() {
        Some(v) if !v.is_empty() => json!(v),
        _ => Value::Null,
    };
    let mut body = serde_json::Map::new();
    body.insert(setting.clone(), value);
    let settings = Value::Object(body);
    ctx.client
        .put_index_settings(&names, &settings, false, false, options.common.timeout_override)
        .await?;
    info!(setting = %setting, count = names.len(), "applied allocation setting");

    if options.wait.waits(false) {
        let joined = names.join(",");
        waiter::wait_for("allocation", &options.wait, || {
            let client = ctx.client.clone();
            let joined = joined.clone();
            async move {
                let health = client.cluster_health(Some(&joined)).await?;
                Ok(health.relocation_done())
            }
        })
        .await?;
    }
    Ok(ActionOutcome::Completed {
        affected: names.len(),
    })
}

pub async fn run_cluster_routing(
    options: &ClusterRoutingOptions,
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let setting = format!("cluster.routing.{}.enable", options.routing_type);
    if ctx.dry_run {
        info!("DRY-RUN: would set {} to {}", setting, options.value);
        return Ok(ActionOutcome::DryRun { affected: 1 });
    }

    ctx.client
        .put_cluster_routing(&setting, &options.value, options.common.timeout_override)
        .await?;
    info!(setting = %setting, value = %options.value, "updated cluster routing");

    if options.wait.waits(false) {
        waiter::wait_for("cluster_routing", &options.wait, || {
            let client = ctx.client.clone();
            async move {
                let health = client.cluster_health(None).await?;
                Ok(health.relocation_done())
            }
        })
        .await?;
    }
    Ok(ActionOutcome::Completed { affected: 1 })
}

pub async fn run_replicas(
    options: &ReplicasOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_index_list(ctx, &options.common, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "replicas")? {
        return Ok(outcome);
    }

    let names: Vec<String> = list.iter().map(|index| index.name.clone()).collect();
    if ctx.dry_run {
        return Ok(log_dry_run(
            "replicas",
            &format!("set number_of_replicas={} on", options.count),
            &names,
        ));
    }

    let settings = json!({ "index.number_of_replicas": options.count });
    ctx.client
        .put_index_settings(&names, &settings, false, false, options.common.timeout_override)
        .await?;
    info!(count = names.len(), replicas = options.count, "updated replica counts");

    if options.wait.waits(false) {
        let joined = names.join(",");
        waiter::wait_for("replicas", &options.wait, || {
            let client = ctx.client.clone();
            let joined = joined.clone();
            async move {
                let health = client.cluster_health(Some(&joined)).await?;
                Ok(health.status != "red" && health.relocation_done())
            }
        })
        .await?;
    }
    Ok(ActionOutcome::Completed {
        affected: names.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_routing_value_validation() {
        let mut options = ClusterRoutingOptions {
            common: CommonOptions::default(),
            routing_type: "allocation".to_string(),
            value: "new_primaries".to_string(),
            wait: WaitOptions::default(),
        };
        assert!(options.validate().is_ok());

        options.value = "replicas".to_string();
        assert!(options.validate().is_err());

        options.routing_type = "rebalance".to_string();
        assert!(options.validate().is_ok());

        options.routing_type = "bogus".to_string();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_allocation_type_validation() {
        let options = AllocationOptions {
            common: CommonOptions::default(),
            key: "box_type".to_string(),
            value: Some("warm".to_string()),
            allocation_type: "demand".to_string(),
            wait: WaitOptions::default(),
        };
        assert!(options.validate().is_err());
    }
}
