//! Composable and legacy index template operations.
//!
//! Rotation only ever retargets the `index.lifecycle.name` setting, so
//! template bodies are handled as opaque JSON with a focused accessor.

use reqwest::Method;
use serde_json::{json, Value};

use crate::client::EsClient;
use crate::error::Result;

/// A template (composable or legacy) with its lifecycle-policy reference.
#[derive(Debug, Clone)]
pub struct TemplateInfo {
    pub name: String,
    pub legacy: bool,
    pub body: Value,
}

impl TemplateInfo {
    /// The `index.lifecycle.name` setting, when the template sets one.
    pub fn lifecycle_policy(&self) -> Option<&str> {
        self.settings_pointer()
            .and_then(|s| lifecycle_name(s))
    }

    /// A copy with `index.lifecycle.name` replaced.
    pub fn with_lifecycle_policy(&self, policy: &str) -> TemplateInfo {
        let mut copy = self.clone();
        let path = if copy.legacy {
            "/settings"
        } else {
            "/template/settings"
        };
        if let Some(settings) = copy.body.pointer_mut(path) {
            set_lifecycle_name(settings, policy);
        }
        copy
    }

    fn settings_pointer(&self) -> Option<&Value> {
        if self.legacy {
            self.body.get("settings")
        } else {
            self.body.pointer("/template/settings")
        }
    }
}

/// Settings may be flat (`"index.lifecycle.name"`) or nested
/// (`{"index": {"lifecycle": {"name": ...}}}`); both occur in the wild.
fn lifecycle_name(settings: &Value) -> Option<&str> {
    settings
        .get("index.lifecycle.name")
        .and_then(Value::as_str)
        .or_else(|| {
            settings
                .pointer("/index/lifecycle/name")
                .and_then(Value::as_str)
        })
}

fn set_lifecycle_name(settings: &mut Value, policy: &str) {
    if settings.get("index.lifecycle.name").is_some() {
        settings["index.lifecycle.name"] = json!(policy);
    } else if let Some(target) = settings.pointer_mut("/index/lifecycle/name") {
        *target = json!(policy);
    }
}

impl EsClient {
    /// Fetch all composable index templates.
    pub async fn get_index_templates(&self) -> Result<Vec<TemplateInfo>> {
        let value: Value = self.get("_index_template", &[]).await?;
        let mut templates = Vec::new();
        if let Some(entries) = value.get("index_templates").and_then(Value::as_array) {
            for entry in entries {
                let Some(name) = entry.get("name").and_then(Value::as_str) else {
                    continue;
                };
                let body = entry.get("index_template").cloned().unwrap_or(Value::Null);
                templates.push(TemplateInfo {
                    name: name.to_string(),
                    legacy: false,
                    body,
                });
            }
        }
        Ok(templates)
    }

    /// Fetch all legacy templates.
    pub async fn get_legacy_templates(&self) -> Result<Vec<TemplateInfo>> {
        let value: Value = self.get("_template", &[]).await?;
        let mut templates = Vec::new();
        if let Some(map) = value.as_object() {
            for (name, body) in map {
                templates.push(TemplateInfo {
                    name: name.clone(),
                    legacy: true,
                    body: body.clone(),
                });
            }
        }
        Ok(templates)
    }

    /// Create or replace a template of either flavor.
    pub async fn put_template(&self, template: &TemplateInfo) -> Result<()> {
        let path = if template.legacy {
            format!("_template/{}", template.name)
        } else {
            format!("_index_template/{}", template.name)
        };
        let _: Value = self
            .request(Method::PUT, &path, &[], Some(&template.body), None)
            .await?;
        Ok(())
    }

    /// Whether any template (either flavor) references the named policy.
    pub async fn template_references_policy(&self, policy: &str) -> Result<bool> {
        for template in self.get_index_templates().await? {
            if template.lifecycle_policy() == Some(policy) {
                return Ok(true);
            }
        }
        for template in self.get_legacy_templates().await? {
            if template.lifecycle_policy() == Some(policy) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
