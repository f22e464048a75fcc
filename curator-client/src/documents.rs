//! Document-level primitives for the status store.
//!
//! The deepfreeze status index is a key-value store over documents; these
//! helpers expose exactly what it needs: create-if-absent (`op_type=create`),
//! compare-and-set updates keyed on `_seq_no`/`_primary_term`, and simple
//! term searches.

use reqwest::Method;
use serde_json::{json, Value};

use crate::client::EsClient;
use crate::error::{EsError, Result};

/// A fetched document with its concurrency-control coordinates.
#[derive(Debug, Clone)]
pub struct VersionedDoc {
    pub id: String,
    pub source: Value,
    pub seq_no: i64,
    pub primary_term: i64,
}

impl EsClient {
    /// Create a hidden single-shard index if it does not already exist,
    /// optionally with explicit mappings.
    pub async fn ensure_hidden_index(&self, name: &str, mappings: Option<&Value>) -> Result<()> {
        if self.index_exists(name).await? {
            return Ok(());
        }
        let mut body = json!({
            "settings": {
                "index": {
                    "number_of_shards": 1,
                    "auto_expand_replicas": "0-1",
                    "hidden": true
                }
            }
        });
        if let Some(mappings) = mappings {
            body["mappings"] = mappings.clone();
        }
        match self.create_index(name, &body).await {
            Ok(()) => Ok(()),
            // Lost a creation race; the index exists now, which is all we need.
            Err(e) if e.is_conflict() || e.reason_contains("resource_already_exists") => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Index (upsert) a document by id.
    pub async fn put_doc(&self, index: &str, id: &str, source: &Value) -> Result<()> {
        let _: Value = self
            .request(
                Method::PUT,
                &format!("{}/_doc/{}", index, id),
                &[("refresh", "true".to_string())],
                Some(source),
                None,
            )
            .await?;
        Ok(())
    }

    /// Create a document only if the id is absent. Returns `false` when the
    /// id already exists (version conflict).
    pub async fn create_doc(&self, index: &str, id: &str, source: &Value) -> Result<bool> {
        let result: Result<Value> = self
            .request(
                Method::PUT,
                &format!("{}/_create/{}", index, id),
                &[("refresh", "true".to_string())],
                Some(source),
                None,
            )
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_conflict() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Replace a document only if its `_seq_no`/`_primary_term` still match.
    /// Returns `false` on a concurrent modification.
    pub async fn cas_put_doc(
        &self,
        index: &str,
        id: &str,
        source: &Value,
        seq_no: i64,
        primary_term: i64,
    ) -> Result<bool> {
        let result: Result<Value> = self
            .request(
                Method::PUT,
                &format!("{}/_doc/{}", index, id),
                &[
                    ("refresh", "true".to_string()),
                    ("if_seq_no", seq_no.to_string()),
                    ("if_primary_term", primary_term.to_string()),
                ],
                Some(source),
                None,
            )
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_conflict() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch a document with its CAS coordinates; `None` when absent.
    pub async fn get_doc(&self, index: &str, id: &str) -> Result<Option<VersionedDoc>> {
        let result: Result<Value> = self.get(&format!("{}/_doc/{}", index, id), &[]).await;
        let value = match result {
            Ok(v) => v,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if value.get("found").and_then(Value::as_bool) != Some(true) {
            return Ok(None);
        }
        Ok(Some(VersionedDoc {
            id: id.to_string(),
            source: value.get("_source").cloned().unwrap_or(Value::Null),
            seq_no: value.get("_seq_no").and_then(Value::as_i64).unwrap_or(0),
            primary_term: value
                .get("_primary_term")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        }))
    }

    /// Delete a document; absent ids are treated as deleted. With CAS
    /// coordinates, returns `false` on a concurrent modification.
    pub async fn delete_doc(
        &self,
        index: &str,
        id: &str,
        cas: Option<(i64, i64)>,
    ) -> Result<bool> {
        let mut query = vec![("refresh", "true".to_string())];
        if let Some((seq_no, primary_term)) = cas {
            query.push(("if_seq_no", seq_no.to_string()));
            query.push(("if_primary_term", primary_term.to_string()));
        }
        let result: Result<Value> = self
            .request(
                Method::DELETE,
                &format!("{}/_doc/{}", index, id),
                &query,
                None,
                None,
            )
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) if e.is_conflict() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Run a query over an index, returning matching documents.
    ///
    /// The status index holds at most a few hundred documents, so a single
    /// bounded page is sufficient.
    pub async fn search_docs(&self, index: &str, query: &Value) -> Result<Vec<VersionedDoc>> {
        let body = json!({
            "size": 10000,
            "seq_no_primary_term": true,
            "query": query
        });
        let result: Result<Value> = self
            .request(
                Method::POST,
                &format!("{}/_search", index),
                &[],
                Some(&body),
                None,
            )
            .await;
        let value = match result {
            Ok(v) => v,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut docs = Vec::new();
        if let Some(hits) = value.pointer("/hits/hits").and_then(Value::as_array) {
            for hit in hits {
                let id = hit
                    .get("_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| EsError::Api {
                        status: 500,
                        reason: "search hit without _id".to_string(),
                    })?;
                docs.push(VersionedDoc {
                    id: id.to_string(),
                    source: hit.get("_source").cloned().unwrap_or(Value::Null),
                    seq_no: hit.get("_seq_no").and_then(Value::as_i64).unwrap_or(0),
                    primary_term: hit
                        .get("_primary_term")
                        .and_then(Value::as_i64)
                        .unwrap_or(0),
                });
            }
        }
        Ok(docs)
    }
}
