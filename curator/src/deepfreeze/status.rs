//! The status store: a key-value view over the hidden `.deepfreeze-status`
//! index.
//!
//! Document ids: `deepfreeze-settings` for the singleton settings document,
//! the repository name for repository records, the request UUID for thaw
//! requests. Every document carries a `doctype` discriminator so each kind
//! can be listed with a single term query.

use serde_json::{json, Value};
use tracing::debug;

use curator_client::EsClient;

use crate::deepfreeze::types::{RepositoryRecord, Settings, ThawRequest};
use crate::error::{Error, Result};

pub const STATUS_INDEX: &str = ".deepfreeze-status";
pub const LOCK_INDEX: &str = ".deepfreeze-locks";
pub const SETTINGS_DOC_ID: &str = "deepfreeze-settings";

const DOCTYPE_SETTINGS: &str = "settings";
const DOCTYPE_REPOSITORY: &str = "repository";
const DOCTYPE_THAW_REQUEST: &str = "thaw_request";

/// Typed access to the status and lock indices.
pub struct StatusIndex<'a> {
    client: &'a EsClient,
}

impl<'a> StatusIndex<'a> {
    pub fn new(client: &'a EsClient) -> Self {
        Self { client }
    }

    /// Create both hidden indices if absent.
    pub async fn ensure(&self) -> Result<()> {
        let status_mappings = json!({
            "dynamic": true,
            "properties": {
                "doctype": { "type": "keyword" },
                "name": { "type": "keyword" },
                "request_id": { "type": "keyword" },
                "thaw_state": { "type": "keyword" },
                "status": { "type": "keyword" }
            }
        });
        self.client
            .ensure_hidden_index(STATUS_INDEX, Some(&status_mappings))
            .await?;
        let lock_mappings = json!({
            "dynamic": true,
            "properties": {
                "locked_by": { "type": "keyword" }
            }
        });
        self.client
            .ensure_hidden_index(LOCK_INDEX, Some(&lock_mappings))
            .await?;
        Ok(())
    }

    fn tagged(doc: &impl serde::Serialize, doctype: &str) -> Result<Value> {
        let mut value = serde_json::to_value(doc)?;
        value["doctype"] = json!(doctype);
        Ok(value)
    }

    // ── Settings ────────────────────────────────────────────────────────

    pub async fn load_settings(&self) -> Result<Option<Settings>> {
        match self.client.get_doc(STATUS_INDEX, SETTINGS_DOC_ID).await {
            Ok(Some(doc)) => Ok(Some(serde_json::from_value(doc.source)?)),
            Ok(None) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load settings or fail: most deepfreeze operations require a prior
    /// `setup`.
    pub async fn require_settings(&self) -> Result<Settings> {
        self.load_settings().await?.ok_or_else(|| {
            Error::Precondition("deepfreeze is not set up (run setup first)".to_string())
        })
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let doc = Self::tagged(settings, DOCTYPE_SETTINGS)?;
        self.client
            .put_doc(STATUS_INDEX, SETTINGS_DOC_ID, &doc)
            .await?;
        debug!("persisted deepfreeze settings");
        Ok(())
    }

    // ── Repository records ──────────────────────────────────────────────

    pub async fn get_repo(&self, name: &str) -> Result<Option<RepositoryRecord>> {
        match self.client.get_doc(STATUS_INDEX, name).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc.source)?)),
            None => Ok(None),
        }
    }

    pub async fn save_repo(&self, record: &RepositoryRecord) -> Result<()> {
        debug_assert!(record.invariant_holds(), "repository record invariant");
        let doc = Self::tagged(record, DOCTYPE_REPOSITORY)?;
        self.client.put_doc(STATUS_INDEX, &record.name, &doc).await?;
        Ok(())
    }

    pub async fn list_repos(&self) -> Result<Vec<RepositoryRecord>> {
        let query = json!({ "term": { "doctype": DOCTYPE_REPOSITORY } });
        let docs = self.client.search_docs(STATUS_INDEX, &query).await?;
        let mut records = Vec::new();
        for doc in docs {
            records.push(serde_json::from_value(doc.source)?);
        }
        Ok(records)
    }

    // ── Thaw requests ───────────────────────────────────────────────────

    pub async fn get_request(&self, request_id: &str) -> Result<Option<ThawRequest>> {
        match self.client.get_doc(STATUS_INDEX, request_id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc.source)?)),
            None => Ok(None),
        }
    }

    pub async fn save_request(&self, request: &ThawRequest) -> Result<()> {
        let doc = Self::tagged(request, DOCTYPE_THAW_REQUEST)?;
        self.client
            .put_doc(STATUS_INDEX, &request.request_id, &doc)
            .await?;
        Ok(())
    }

    pub async fn list_requests(&self, include_terminal: bool) -> Result<Vec<ThawRequest>> {
        let query = json!({ "term": { "doctype": DOCTYPE_THAW_REQUEST } });
        let docs = self.client.search_docs(STATUS_INDEX, &query).await?;
        let mut requests = Vec::new();
        for doc in docs {
            let request: ThawRequest = serde_json::from_value(doc.source)?;
            if include_terminal || !request.status.is_terminal() {
                requests.push(request);
            }
        }
        Ok(requests)
    }

    pub async fn delete_request(&self, request_id: &str) -> Result<()> {
        self.client
            .delete_doc(STATUS_INDEX, request_id, None)
            .await?;
        Ok(())
    }
}
