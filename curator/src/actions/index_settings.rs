//! The index_settings action.
//!
//! Static settings can only be applied to closed indices; attempting them on
//! an open index fails preflight unless `ignore_unavailable` lets the
//! cluster sort it out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::actions::{
    build_index_list, check_empty, log_dry_run, ActionContext, ActionOutcome, CommonOptions,
};
use crate::error::{Error, Result};
use crate::filter::FilterSpec;

/// Index settings that cannot change while an index is open.
const STATIC_SETTINGS: &[&str] = &[
    "number_of_shards",
    "codec",
    "routing_partition_size",
    "soft_deletes.enabled",
    "shard.check_on_startup",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettingsOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    /// Nested settings document, e.g. `{"index": {"refresh_interval": "5s"}}`
    pub index_settings: Value,
    #[serde(default)]
    pub ignore_unavailable: bool,
    #[serde(default)]
    pub preserve_existing: bool,
}

impl IndexSettingsOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.index_settings.is_object() {
            return Err(Error::Config(
                "index_settings must be a settings object".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the settings body names any static setting.
    pub fn has_static_setting(&self) -> bool {
        let keys: Vec<String> = match self.index_settings.get("index") {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => self
                .index_settings
                .as_object()
                .map(|map| {
                    map.keys()
                        .map(|k| k.trim_start_matches("index.").to_string())
                        .collect()
                })
                .unwrap_or_default(),
        };
        keys.iter()
            .any(|key| STATIC_SETTINGS.contains(&key.as_str()))
    }
}

pub async fn run(
    options: &IndexSettingsOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_index_list(ctx, &options.common, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "index_settings")? {
        return Ok(outcome);
    }

    if options.has_static_setting() && !options.ignore_unavailable {
        if let Some(open) = list.iter().find(|index| index.is_open()) {
            return Err(Error::Precondition(format!(
                "static settings cannot be applied to open index {} (set ignore_unavailable to proceed)",
                open.name
            )));
        }
    }

    let names: Vec<String> = list.iter().map(|index| index.name.clone()).collect();
    if ctx.dry_run {
        return Ok(log_dry_run("index_settings", "apply settings to", &names));
    }

    ctx.client
        .put_index_settings(
            &names,
            &options.index_settings,
            options.preserve_existing,
            options.ignore_unavailable,
            options.common.timeout_override,
        )
        .await?;
    info!(count = names.len(), "applied index settings");
    Ok(ActionOutcome::Completed {
        affected: names.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(settings: Value) -> IndexSettingsOptions {
        IndexSettingsOptions {
            common: CommonOptions::default(),
            index_settings: settings,
            ignore_unavailable: false,
            preserve_existing: false,
        }
    }

    #[test]
    fn test_static_detection_nested() {
        assert!(options(json!({ "index": { "codec": "best_compression" } })).has_static_setting());
        assert!(!options(json!({ "index": { "refresh_interval": "5s" } })).has_static_setting());
    }

    #[test]
    fn test_static_detection_flat() {
        assert!(options(json!({ "index.number_of_shards": 1 })).has_static_setting());
        assert!(!options(json!({ "index.number_of_replicas": 1 })).has_static_setting());
    }

    #[test]
    fn test_validate_rejects_non_object() {
        assert!(options(json!("refresh_interval=5s")).validate().is_err());
        assert!(options(json!({ "index": {} })).validate().is_ok());
    }
}
