//! The alias action: atomic add/remove across two filter chains.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::actions::{build_index_list, ActionContext, ActionOutcome, CommonOptions};
use crate::error::{Error, Result};
use crate::filter::FilterSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    /// The alias being managed
    pub name: String,
    /// Filter/routing settings applied to additions only
    #[serde(default)]
    pub extra_settings: Option<Value>,
    /// Warn instead of failing when one side matches nothing
    #[serde(default)]
    pub warn_if_no_indices: bool,
}

/// One side (`add:` or `remove:`) of the action, carrying its own chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AliasSide {
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

impl AliasOptions {
    pub fn validate(&self, add: &Option<AliasSide>, remove: &Option<AliasSide>) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("alias action requires a name".to_string()));
        }
        if add.is_none() && remove.is_none() {
            return Err(Error::Config(
                "alias action requires an add or remove section".to_string(),
            ));
        }
        Ok(())
    }
}

pub async fn run(
    options: &AliasOptions,
    add: Option<&AliasSide>,
    remove: Option<&AliasSide>,
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let mut actions: Vec<Value> = Vec::new();
    let mut affected = 0;

    if let Some(remove) = remove {
        let list = build_index_list(ctx, &options.common, &remove.filters).await?;
        if list.is_empty() && !options.warn_if_no_indices && add.is_none() {
            return Err(Error::EmptyList(
                "no indices matched the alias remove filters".to_string(),
            ));
        }
        if list.is_empty() {
            warn!(alias = %options.name, "alias remove filters matched nothing");
        }
        for index in &list {
            actions.push(json!({
                "remove": { "index": index.name, "alias": options.name }
            }));
        }
        affected += list.len();
    }

    if let Some(add) = add {
        let list = build_index_list(ctx, &options.common, &add.filters).await?;
        if list.is_empty() && !options.warn_if_no_indices && remove.is_none() {
            return Err(Error::EmptyList(
                "no indices matched the alias add filters".to_string(),
            ));
        }
        if list.is_empty() {
            warn!(alias = %options.name, "alias add filters matched nothing");
        }
        for index in &list {
            let mut entry = serde_json::Map::new();
            entry.insert("index".to_string(), json!(index.name));
            entry.insert("alias".to_string(), json!(options.name));
            if let Some(extra) = options.extra_settings.as_ref().and_then(Value::as_object) {
                for (key, value) in extra {
                    entry.insert(key.clone(), value.clone());
                }
            }
            actions.push(json!({ "add": entry }));
        }
        affected += list.len();
    }

    if actions.is_empty() {
        if options.common.ignore_empty_list || options.warn_if_no_indices {
            info!(alias = %options.name, "nothing to do for alias");
            return Ok(ActionOutcome::Skipped {
                reason: "no alias changes".to_string(),
            });
        }
        return Err(Error::EmptyList(format!(
            "no indices matched either side of the alias action for {}",
            options.name
        )));
    }

    if ctx.dry_run {
        for action in &actions {
            info!(alias = %options.name, "DRY-RUN: would apply alias change {}", action);
        }
        return Ok(ActionOutcome::DryRun { affected });
    }

    ctx.client.update_aliases(actions).await?;
    info!(alias = %options.name, affected, "alias updated atomically");
    Ok(ActionOutcome::Completed { affected })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_a_side() {
        let options = AliasOptions {
            common: CommonOptions::default(),
            name: "a".to_string(),
            extra_settings: None,
            warn_if_no_indices: false,
        };
        assert!(options.validate(&None, &None).is_err());
        assert!(options
            .validate(&Some(AliasSide::default()), &None)
            .is_ok());
    }

    #[test]
    fn test_requires_name() {
        let options = AliasOptions {
            common: CommonOptions::default(),
            name: String::new(),
            extra_settings: None,
            warn_if_no_indices: false,
        };
        assert!(options
            .validate(&Some(AliasSide::default()), &None)
            .is_err());
    }
}
