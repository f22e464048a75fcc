//! The rollover action.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::actions::{ActionContext, ActionOutcome, CommonOptions};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolloverConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_docs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<String>,
}

impl RolloverConditions {
    pub fn is_empty(&self) -> bool {
        self.max_age.is_none() && self.max_docs.is_none() && self.max_size.is_none()
    }

    pub fn to_body(&self) -> Value {
        let mut body = serde_json::Map::new();
        if let Some(age) = &self.max_age {
            body.insert("max_age".to_string(), json!(age));
        }
        if let Some(docs) = self.max_docs {
            body.insert("max_docs".to_string(), json!(docs));
        }
        if let Some(size) = &self.max_size {
            body.insert("max_size".to_string(), json!(size));
        }
        Value::Object(body)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    /// The alias to roll over
    pub name: String,
    pub conditions: RolloverConditions,
    /// Explicit or date-math target name
    #[serde(default)]
    pub new_index: Option<String>,
    #[serde(default)]
    pub extra_settings: Option<Value>,
}

impl RolloverOptions {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("rollover requires an alias name".to_string()));
        }
        if self.conditions.is_empty() {
            return Err(Error::Config(
                "rollover requires at least one of max_age, max_docs, max_size".to_string(),
            ));
        }
        if let Some(new_index) = &self.new_index {
            // Date-math names are validated by the cluster; explicit names
            // must end in an incrementable numeric suffix.
            if !new_index.starts_with('<') && !ends_in_increment(new_index) {
                return Err(Error::Config(format!(
                    "new_index '{}' must end in a numeric suffix (e.g. -000001)",
                    new_index
                )));
            }
        }
        Ok(())
    }
}

fn ends_in_increment(name: &str) -> bool {
    match name.rsplit_once('-') {
        Some((_, digits)) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

pub async fn run(options: &RolloverOptions, ctx: &ActionContext<'_>) -> Result<ActionOutcome> {
    let members = match ctx.client.get_alias(&options.name).await {
        Ok(members) => members,
        Err(e) if e.is_not_found() => {
            return Err(Error::Precondition(format!(
                "rollover alias {} does not exist",
                options.name
            )))
        }
        Err(e) => return Err(e.into()),
    };
    if members.len() > 1 && !members.values().any(|write| *write) {
        return Err(Error::Precondition(format!(
            "alias {} spans {} indices with no write index; rollover target is ambiguous",
            options.name,
            members.len()
        )));
    }

    if ctx.dry_run {
        info!(
            alias = %options.name,
            "DRY-RUN: would roll over alias when conditions {:?} are met",
            options.conditions
        );
        return Ok(ActionOutcome::DryRun { affected: 1 });
    }

    let rolled = ctx
        .client
        .rollover(
            &options.name,
            &options.conditions.to_body(),
            options.new_index.as_deref(),
            options.extra_settings.as_ref(),
            options.common.timeout_override,
        )
        .await?;
    info!(alias = %options.name, rolled_over = rolled, "rollover complete");
    Ok(ActionOutcome::Completed {
        affected: usize::from(rolled),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RolloverOptions {
        RolloverOptions {
            common: CommonOptions::default(),
            name: "logs-write".to_string(),
            conditions: RolloverConditions {
                max_age: Some("1d".to_string()),
                max_docs: None,
                max_size: None,
            },
            new_index: None,
            extra_settings: None,
        }
    }

    #[test]
    fn test_requires_a_condition() {
        let mut options = base();
        options.conditions = RolloverConditions::default();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_new_index_suffix_rules() {
        let mut options = base();
        options.new_index = Some("logs-000002".to_string());
        assert!(options.validate().is_ok());

        options.new_index = Some("logs-two".to_string());
        assert!(options.validate().is_err());

        // Date-math names are passed through for the cluster to resolve.
        options.new_index = Some("<logs-{now/d}-000001>".to_string());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_conditions_body() {
        let conditions = RolloverConditions {
            max_age: Some("7d".to_string()),
            max_docs: Some(1000),
            max_size: Some("5gb".to_string()),
        };
        let body = conditions.to_body();
        assert_eq!(body["max_age"], "7d");
        assert_eq!(body["max_docs"], 1000);
        assert_eq!(body["max_size"], "5gb");
    }
}
