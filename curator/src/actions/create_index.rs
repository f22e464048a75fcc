//! The create_index action.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::actions::{ActionContext, ActionOutcome, CommonOptions};
use crate::error::{Error, Result};
use crate::filter::timestring::render_timestring;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIndexOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    /// Literal, strftime, or Elasticsearch date-math (`<...>`) name
    pub name: String,
    /// Optional `settings` / `mappings` body
    #[serde(default)]
    pub extra_settings: Option<Value>,
}

impl CreateIndexOptions {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("create_index requires a name".to_string()));
        }
        Ok(())
    }
}

/// Resolve the index name: date-math passes through (percent-encoded for the
/// URL path), strftime templates are expanded locally.
pub fn resolve_name(name: &str, now_epoch: i64) -> Result<String> {
    if name.starts_with('<') {
        return Ok(name
            .replace('<', "%3C")
            .replace('>', "%3E")
            .replace('+', "%2B"));
    }
    let now = Utc
        .timestamp_opt(now_epoch, 0)
        .single()
        .ok_or_else(|| Error::Fatal("invalid context epoch".to_string()))?;
    render_timestring(name, now)
}

pub async fn run(
    options: &CreateIndexOptions,
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let name = resolve_name(&options.name, ctx.now_epoch)?;

    if ctx.dry_run {
        info!("DRY-RUN: would create index {}", options.name);
        return Ok(ActionOutcome::DryRun { affected: 1 });
    }

    let body = options
        .extra_settings
        .clone()
        .unwrap_or_else(|| Value::Object(Default::default()));
    ctx.client.create_index(&name, &body).await?;
    info!(index = %options.name, "created index");
    Ok(ActionOutcome::Completed { affected: 1 })
}
