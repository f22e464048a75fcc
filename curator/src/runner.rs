//! The action-file orchestrator.
//!
//! Actions run strictly in ascending id order; one begins only after its
//! predecessor completes. An unhandled error stops the run. An error under
//! `continue_if_exception` is logged and recorded, and the next numbered
//! action runs, except empty-list conditions, which only
//! `ignore_empty_list` may soften, and fatal errors, which always abort.

use chrono::Utc;
use tracing::{error, info};

use curator_client::EsClient;

use crate::actions::{ActionContext, ActionOutcome};
use crate::config::ActionFile;
use crate::error::Error;

/// What happened to one numbered action.
#[derive(Debug)]
pub enum ActionResult {
    Completed(ActionOutcome),
    Disabled,
    /// Error swallowed by `continue_if_exception`
    Continued(Error),
    Failed(Error),
}

/// Per-action outcomes of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub results: Vec<(u32, String, ActionResult)>,
}

impl RunReport {
    /// Process exit code: the first hard failure decides; swallowed errors
    /// count as success because the action file declared them acceptable.
    pub fn exit_code(&self) -> i32 {
        for (_, _, result) in &self.results {
            if let ActionResult::Failed(e) = result {
                return e.exit_code();
            }
        }
        0
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code() == 0
    }

    /// Human-readable summary of which numbered actions failed and why.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for (id, action, result) in &self.results {
            let line = match result {
                ActionResult::Completed(ActionOutcome::Completed { affected }) => {
                    format!("action {} ({}): completed, {} affected", id, action, affected)
                }
                ActionResult::Completed(ActionOutcome::DryRun { affected }) => {
                    format!("action {} ({}): dry-run, {} would be affected", id, action, affected)
                }
                ActionResult::Completed(ActionOutcome::Skipped { reason }) => {
                    format!("action {} ({}): skipped ({})", id, action, reason)
                }
                ActionResult::Disabled => {
                    format!("action {} ({}): disabled", id, action)
                }
                ActionResult::Continued(e) => {
                    format!("action {} ({}): failed but continued: {}", id, action, e)
                }
                ActionResult::Failed(e) => {
                    format!("action {} ({}): FAILED: {}", id, action, e)
                }
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// Drives an action file against a cluster.
pub struct Runner<'a> {
    pub client: &'a EsClient,
    pub dry_run: bool,
}

impl<'a> Runner<'a> {
    pub fn new(client: &'a EsClient, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    pub async fn run(&self, file: &ActionFile) -> RunReport {
        let mut report = RunReport::default();

        for (id, spec) in &file.actions {
            let name = spec.name().to_string();
            info!(
                action = %name,
                number = id,
                description = spec.description().unwrap_or(""),
                dry_run = self.dry_run,
                "starting action"
            );

            if spec.common().disable_action {
                info!(action = %name, number = id, "action disabled; skipping");
                report.results.push((*id, name, ActionResult::Disabled));
                continue;
            }

            let ctx = ActionContext {
                client: self.client,
                dry_run: self.dry_run,
                now_epoch: Utc::now().timestamp(),
            };

            match spec.run(&ctx).await {
                Ok(outcome) => {
                    report
                        .results
                        .push((*id, name, ActionResult::Completed(outcome)));
                }
                Err(e) if spec.common().continue_if_exception && e.is_continuable() => {
                    error!(
                        action = %name,
                        number = id,
                        error = %e,
                        "action failed; continuing per continue_if_exception"
                    );
                    report.results.push((*id, name, ActionResult::Continued(e)));
                }
                Err(e) => {
                    error!(action = %name, number = id, error = %e, "action failed");
                    report.results.push((*id, name, ActionResult::Failed(e)));
                    break;
                }
            }
        }
        report
    }
}
