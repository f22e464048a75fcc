//! Client-side polling for long-running cluster operations.
//!
//! Elasticsearch APIs that accept `wait_for_completion=false` return
//! immediately; the executor then polls an action-specific completion probe
//! every `wait_interval` seconds until `max_wait` elapses. `max_wait = -1`
//! means no deadline; `max_wait = 0` times out at the first incomplete
//! probe.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Wait/poll settings shared by every waiting action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitOptions {
    /// Per-action default; `None` falls back to the action's own default.
    #[serde(default)]
    pub wait_for_completion: Option<bool>,
    #[serde(default = "default_wait_interval")]
    pub wait_interval: u64,
    #[serde(default = "default_max_wait")]
    pub max_wait: i64,
}

fn default_wait_interval() -> u64 {
    9
}

fn default_max_wait() -> i64 {
    -1
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            wait_for_completion: None,
            wait_interval: default_wait_interval(),
            max_wait: default_max_wait(),
        }
    }
}

impl WaitOptions {
    pub fn validate(&self) -> Result<()> {
        if !(1..=30).contains(&self.wait_interval) {
            return Err(Error::Config(format!(
                "wait_interval must be between 1 and 30 seconds, got {}",
                self.wait_interval
            )));
        }
        Ok(())
    }

    pub fn waits(&self, action_default: bool) -> bool {
        self.wait_for_completion.unwrap_or(action_default)
    }
}

/// Poll `probe` until it reports completion or the deadline passes.
///
/// Probe errors propagate immediately; a probe returning `false` keeps the
/// loop alive.
pub async fn wait_for<F, Fut>(action: &str, options: &WaitOptions, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut waited: u64 = 0;
    loop {
        if probe().await? {
            debug!(action, waited, "wait complete");
            return Ok(());
        }
        if options.max_wait >= 0 && waited >= options.max_wait as u64 {
            return Err(Error::Timeout {
                action: action.to_string(),
                waited,
            });
        }
        tokio::time::sleep(Duration::from_secs(options.wait_interval)).await;
        waited += options.wait_interval;
    }
}
