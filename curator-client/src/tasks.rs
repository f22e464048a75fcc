//! Task API operations, used by reindex polling.

use reqwest::Method;
use serde_json::Value;

use crate::client::EsClient;
use crate::error::Result;

/// Status of a server-side task.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub completed: bool,
    /// Failure descriptions, when the completed task carried any
    pub failures: Vec<String>,
}

impl EsClient {
    /// Submit a reindex request; returns the task id.
    pub async fn start_reindex(
        &self,
        body: &Value,
        slices: Option<u32>,
        requests_per_second: Option<f64>,
        timeout_override: Option<u64>,
    ) -> Result<String> {
        let mut query = vec![("wait_for_completion", "false".to_string())];
        if let Some(slices) = slices {
            query.push(("slices", slices.to_string()));
        }
        if let Some(rps) = requests_per_second {
            query.push(("requests_per_second", rps.to_string()));
        }
        let value: Value = self
            .request(Method::POST, "_reindex", &query, Some(body), timeout_override)
            .await?;
        Ok(value
            .get("task")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Poll one task.
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        let value: Value = self.get(&format!("_tasks/{}", task_id), &[]).await?;
        let completed = value
            .get("completed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let mut failures = Vec::new();
        if let Some(arr) = value
            .pointer("/response/failures")
            .and_then(Value::as_array)
        {
            for failure in arr {
                failures.push(failure.to_string());
            }
        }
        if let Some(error) = value.get("error") {
            failures.push(error.to_string());
        }
        Ok(TaskStatus {
            completed,
            failures,
        })
    }
}
