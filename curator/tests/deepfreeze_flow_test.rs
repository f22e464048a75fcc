//! Deepfreeze rotation and thaw flows against a stubbed cluster and an
//! in-memory object store.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use curator::deepfreeze::rotate::RotateParams;
use curator::Deepfreeze;
use curator_client::EsClient;
use curator_storage::{MemoryObjectStore, StorageClass};

fn found_doc(source: serde_json::Value) -> serde_json::Value {
    json!({
        "found": true,
        "_source": source,
        "_seq_no": 0,
        "_primary_term": 1
    })
}

/// Both hidden indices exist; document writes and lock traffic succeed.
async fn mount_status_store_stubs(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.deepfreeze-status/_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/.deepfreeze-locks/_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/\.deepfreeze-status/_doc/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "updated" })))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/\.deepfreeze-locks/_create/.+$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "result": "created" })))
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/\.deepfreeze-locks/_doc/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "deleted" })))
        .mount(server)
        .await;
}

// ── Rotation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rotation_versions_policies_and_retires_oldest_repo() {
    let server = MockServer::start().await;
    mount_status_store_stubs(&server).await;

    // Settings document: oneup style, path rotation, last suffix 000001.
    Mock::given(method("GET"))
        .and(path("/.deepfreeze-status/_doc/deepfreeze-settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(found_doc(json!({
            "repo_name_prefix": "deepfreeze",
            "bucket_name_prefix": "deepfreeze",
            "base_path_prefix": "snapshots",
            "storage_class": "GLACIER",
            "rotate_by": "path",
            "last_suffix": "000001",
            "provider": "aws",
            "style": "oneup",
            "keep": 6,
            "doctype": "settings"
        }))))
        .mount(&server)
        .await;

    // One policy references the active repository.
    Mock::given(method("GET"))
        .and(path("/_ilm/policy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logs": {
                "policy": {
                    "phases": {
                        "hot": { "actions": { "rollover": { "max_size": "50gb" } } },
                        "cold": {
                            "min_age": "30d",
                            "actions": {
                                "searchable_snapshot": {
                                    "snapshot_repository": "deepfreeze-000001"
                                }
                            }
                        }
                    }
                }
            }
        })))
        .mount(&server)
        .await;

    // A composable template pins the policy; no legacy templates.
    Mock::given(method("GET"))
        .and(path("/_index_template"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "index_templates": [{
                "name": "logs-tpl",
                "index_template": {
                    "template": { "settings": { "index.lifecycle.name": "logs" } }
                }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_template"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    // One existing repository record.
    Mock::given(method("POST"))
        .and(path("/.deepfreeze-status/_search"))
        .and(body_partial_json(json!({
            "query": { "term": { "doctype": "repository" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": { "hits": [{
                "_id": "deepfreeze-000001",
                "_seq_no": 0,
                "_primary_term": 1,
                "_source": {
                    "name": "deepfreeze-000001",
                    "bucket": "deepfreeze",
                    "base_path": "snapshots-000001",
                    "suffix": "000001",
                    "is_mounted": true,
                    "thaw_state": "active",
                    "indices": [],
                    "doctype": "repository"
                }
            }]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/.deepfreeze-status/_search"))
        .and(body_partial_json(json!({
            "query": { "term": { "doctype": "thaw_request" } }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "hits": { "hits": [] } })),
        )
        .mount(&server)
        .await;

    // Snapshots inside the old repository, for the rescan.
    Mock::given(method("GET"))
        .and(path("/_snapshot/deepfreeze-000001/_all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "snapshots": [{
                "snapshot": "snap-1",
                "state": "SUCCESS",
                "start_time_in_millis": 1736899200000i64,
                "indices": ["logs-2025.01.15"]
            }]
        })))
        .mount(&server)
        .await;

    // Cluster mutations rotation performs.
    Mock::given(method("PUT"))
        .and(path("/_snapshot/deepfreeze-000002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/_ilm/policy/logs-000002"))
        .and(body_partial_json(json!({
            "policy": {
                "phases": {
                    "cold": {
                        "actions": {
                            "searchable_snapshot": {
                                "snapshot_repository": "deepfreeze-000002"
                            }
                        }
                    }
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/_index_template/logs-tpl"))
        .and(body_partial_json(json!({
            "template": { "settings": { "index.lifecycle.name": "logs-000002" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/_snapshot/deepfreeze-000001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryObjectStore::new());
    store.seed_object(
        "deepfreeze",
        "snapshots-000001/snap-1.dat",
        4096,
        StorageClass::Standard,
    );

    let client = EsClient::for_url(&server.uri()).unwrap();
    let deepfreeze = Deepfreeze::new(client, store.clone());

    let report = deepfreeze
        .rotate(
            RotateParams {
                keep: Some(1),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();

    assert_eq!(report.new_suffix, "000002");
    assert_eq!(report.new_repository, "deepfreeze-000002");
    assert_eq!(report.policies_created, vec!["logs-000002"]);
    assert_eq!(report.templates_updated, vec!["logs-tpl"]);
    assert_eq!(report.unmounted, vec!["deepfreeze-000001"]);

    // The retired repository's objects moved to cold storage.
    assert_eq!(
        store.storage_class_of("deepfreeze", "snapshots-000001/snap-1.dat"),
        Some(StorageClass::Glacier)
    );

    // The new bucket exists (path rotation reuses the bucket name).
    assert!(store.bucket_exists("deepfreeze"));

    // The original policy was never rewritten in place.
    let requests = server.received_requests().await.unwrap();
    assert!(!requests.iter().any(|request| {
        request.method.as_str() == "PUT" && request.url.path() == "/_ilm/policy/logs"
    }));
}

// ── Cleanup after expiry ────────────────────────────────────────────────────

#[tokio::test]
async fn test_cleanup_refreezes_expired_repository() {
    let server = MockServer::start().await;
    mount_status_store_stubs(&server).await;

    Mock::given(method("GET"))
        .and(path("/.deepfreeze-status/_doc/deepfreeze-settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(found_doc(json!({
            "repo_name_prefix": "deepfreeze",
            "bucket_name_prefix": "deepfreeze",
            "base_path_prefix": "snapshots",
            "storage_class": "GLACIER",
            "rotate_by": "path",
            "last_suffix": "000006",
            "provider": "aws",
            "style": "oneup",
            "keep": 6
        }))))
        .mount(&server)
        .await;

    // One thawed repository whose window lapsed an hour ago.
    let record = json!({
        "name": "deepfreeze-000004",
        "bucket": "deepfreeze",
        "base_path": "snapshots-000004",
        "suffix": "000004",
        "is_mounted": true,
        "thaw_state": "thawed",
        "indices": ["logs-2025.01.15"],
        "expires_at": "2020-01-01T00:00:00Z",
        "doctype": "repository"
    });
    Mock::given(method("POST"))
        .and(path("/.deepfreeze-status/_search"))
        .and(body_partial_json(json!({
            "query": { "term": { "doctype": "repository" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": { "hits": [{
                "_id": "deepfreeze-000004",
                "_seq_no": 0,
                "_primary_term": 1,
                "_source": record
            }]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/.deepfreeze-status/_doc/deepfreeze-000004"))
        .respond_with(ResponseTemplate::new(200).set_body_json(found_doc(json!({
            "name": "deepfreeze-000004",
            "bucket": "deepfreeze",
            "base_path": "snapshots-000004",
            "suffix": "000004",
            "is_mounted": true,
            "thaw_state": "thawed",
            "indices": ["logs-2025.01.15"],
            "expires_at": "2020-01-01T00:00:00Z"
        }))))
        .mount(&server)
        .await;

    // The request that thawed it is still open.
    Mock::given(method("POST"))
        .and(path("/.deepfreeze-status/_search"))
        .and(body_partial_json(json!({
            "query": { "term": { "doctype": "thaw_request" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": { "hits": [{
                "_id": "req-9",
                "_seq_no": 0,
                "_primary_term": 1,
                "_source": {
                    "request_id": "req-9",
                    "repos": ["deepfreeze-000004"],
                    "status": "in_progress",
                    "created_at": "2025-06-01T00:00:00Z",
                    "start_date": "2025-01-01T00:00:00Z",
                    "end_date": "2025-02-01T00:00:00Z",
                    "duration_days": 7,
                    "retrieval_tier": "Standard",
                    "doctype": "thaw_request"
                }
            }]}
        })))
        .mount(&server)
        .await;

    // Inventory: one index mounted out of the expired repository.
    Mock::given(method("GET"))
        .and(path("/_all/_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "partial-logs-2025.01.15": {
                "settings": {
                    "index": {
                        "creation_date": "1736899200000",
                        "number_of_shards": "1",
                        "store": {
                            "type": "snapshot",
                            "snapshot": {
                                "repository_name": "deepfreeze-000004",
                                "snapshot_name": "snap-1",
                                "partial": "true"
                            }
                        }
                    }
                }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_cat/indices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "index": "partial-logs-2025.01.15", "status": "open" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_all/_stats/docs,store"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "indices": {} })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_all/_alias"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_data_stream"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data_streams": [] })))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/partial-logs-2025.01.15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/_snapshot/deepfreeze-000004"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_ilm/policy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryObjectStore::new());
    store.seed_object(
        "deepfreeze",
        "snapshots-000004/blob-1",
        100,
        StorageClass::Standard,
    );

    let client = EsClient::for_url(&server.uri()).unwrap();
    let deepfreeze = Deepfreeze::new(client, store.clone());

    let report = deepfreeze
        .cleanup(Default::default(), false)
        .await
        .unwrap();

    assert_eq!(report.repositories_refrozen, vec!["deepfreeze-000004"]);
    assert_eq!(
        store.storage_class_of("deepfreeze", "snapshots-000004/blob-1"),
        Some(StorageClass::Glacier)
    );

    // The open request that referenced the repository flipped to refrozen.
    let requests = server.received_requests().await.unwrap();
    let flipped = requests.iter().any(|request| {
        request.method.as_str() == "PUT"
            && request.url.path() == "/.deepfreeze-status/_doc/req-9"
            && String::from_utf8_lossy(&request.body).contains("refrozen")
    });
    assert!(flipped);
}

// ── Thaw check-status ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_thaw_status_mounts_restored_repository() {
    let server = MockServer::start().await;
    mount_status_store_stubs(&server).await;

    Mock::given(method("GET"))
        .and(path("/.deepfreeze-status/_doc/req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(found_doc(json!({
            "request_id": "req-1",
            "repos": ["deepfreeze-000002"],
            "status": "in_progress",
            "created_at": "2025-03-01T00:00:00Z",
            "start_date": "2025-01-01T00:00:00Z",
            "end_date": "2025-02-01T00:00:00Z",
            "duration_days": 7,
            "retrieval_tier": "Standard",
            "doctype": "thaw_request"
        }))))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/.deepfreeze-status/_doc/deepfreeze-000002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(found_doc(json!({
            "name": "deepfreeze-000002",
            "bucket": "deepfreeze",
            "base_path": "snapshots-000002",
            "suffix": "000002",
            "is_mounted": false,
            "thaw_state": "thawing",
            "indices": [],
            "doctype": "repository"
        }))))
        .mount(&server)
        .await;

    // Mounting the repository back and rescanning it.
    Mock::given(method("PUT"))
        .and(path("/_snapshot/deepfreeze-000002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_snapshot/deepfreeze-000002/_all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "snapshots": [{
                "snapshot": "snap-1",
                "state": "SUCCESS",
                "start_time_in_millis": 1736899200000i64,
                "indices": ["logs-2025.01.15", "logs-2024.11.01"]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/_ilm/policy/deepfreeze-thaw-req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;

    // Only the index inside the request window is mounted.
    Mock::given(method("POST"))
        .and(path("/_snapshot/deepfreeze-000002/snap-1/_mount"))
        .and(body_partial_json(json!({ "index": "logs-2025.01.15" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "snapshot": {
                "snapshot": "snap-1",
                "indices": ["partial-logs-2025.01.15"]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/partial-logs-2025.01.15/_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryObjectStore::new());
    store.seed_object(
        "deepfreeze",
        "snapshots-000002/blob-1",
        100,
        StorageClass::Glacier,
    );
    store.seed_object(
        "deepfreeze",
        "snapshots-000002/blob-2",
        100,
        StorageClass::Glacier,
    );
    for key in ["snapshots-000002/blob-1", "snapshots-000002/blob-2"] {
        use curator_storage::{ObjectStoreClient, RetrievalTier};
        store
            .request_restore("deepfreeze", key, 7, RetrievalTier::Standard)
            .await
            .unwrap();
    }
    store.complete_restores();

    let client = EsClient::for_url(&server.uri()).unwrap();
    let deepfreeze = Deepfreeze::new(client, store);

    let reports = deepfreeze.thaw_status(Some("req-1")).await.unwrap();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];

    assert_eq!(report.request.status.to_string(), "completed");
    assert_eq!(report.repos.len(), 1);
    assert!(report.repos[0].mounted);
    assert_eq!(report.repos[0].restored, report.repos[0].total);

    // The out-of-window index was never mounted.
    let requests = server.received_requests().await.unwrap();
    let mounts: Vec<_> = requests
        .iter()
        .filter(|request| request.url.path().ends_with("/_mount"))
        .collect();
    assert_eq!(mounts.len(), 1);
}
