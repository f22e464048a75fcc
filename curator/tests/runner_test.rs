//! Action-file runs against a stubbed cluster.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use curator::{ActionFile, Runner};
use curator_client::EsClient;

// ── Stub helpers ────────────────────────────────────────────────────────────

/// Mount the inventory surface: one open `logstash-2017.04.04` index.
async fn mount_inventory(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/_all/_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logstash-2017.04.04": {
                "settings": {
                    "index": {
                        "creation_date": "1491264000000",
                        "number_of_shards": "1"
                    }
                }
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_cat/indices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "index": "logstash-2017.04.04", "status": "open" }
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_all/_stats/docs,store"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indices": {
                "logstash-2017.04.04": {
                    "primaries": { "docs": { "count": 10 } },
                    "total": { "store": { "size_in_bytes": 1000 } }
                }
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_all/_alias"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_data_stream"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data_streams": [] })))
        .mount(server)
        .await;
}

// ── continue_if_exception isolation ─────────────────────────────────────────

#[tokio::test]
async fn test_failed_action_with_continue_lets_next_action_run() {
    let server = MockServer::start().await;
    mount_inventory(&server).await;

    // Action 1's delete blows up server-side.
    Mock::given(method("DELETE"))
        .and(path("/logstash-2017.04.04"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "type": "exception", "reason": "node disconnected" },
            "status": 500
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Action 2 must still run.
    Mock::given(method("PUT"))
        .and(path("/after-failure"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;

    let actions = ActionFile::parse(
        r#"
actions:
  1:
    action: delete_indices
    options:
      continue_if_exception: true
    filters:
      - filtertype: pattern
        kind: prefix
        value: logstash-
  2:
    action: create_index
    options:
      name: after-failure
"#,
    )
    .unwrap();

    let client = EsClient::for_url(&server.uri()).unwrap();
    let report = Runner::new(&client, false).run(&actions).await;

    // The swallowed failure shows in the summary but not the exit code.
    assert_eq!(report.exit_code(), 0);
    assert!(report.summary().contains("failed but continued"));
    assert!(report.summary().contains("action 2"));
}

#[tokio::test]
async fn test_failed_action_without_continue_stops_the_run() {
    let server = MockServer::start().await;
    mount_inventory(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/logstash-2017.04.04"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "type": "exception", "reason": "node disconnected" },
            "status": 500
        })))
        .mount(&server)
        .await;

    let actions = ActionFile::parse(
        r#"
actions:
  1:
    action: delete_indices
    filters:
      - filtertype: pattern
        kind: prefix
        value: logstash-
  2:
    action: create_index
    options:
      name: never-created
"#,
    )
    .unwrap();

    let client = EsClient::for_url(&server.uri()).unwrap();
    let report = Runner::new(&client, false).run(&actions).await;
    assert_eq!(report.exit_code(), 2);

    // Action 2 never ran.
    let requests = server.received_requests().await.unwrap();
    assert!(!requests
        .iter()
        .any(|request| request.url.path() == "/never-created"));
}

// ── Empty-list policy ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_list_is_exit_code_one() {
    let server = MockServer::start().await;
    mount_inventory(&server).await;

    let actions = ActionFile::parse(
        r#"
actions:
  1:
    action: delete_indices
    filters:
      - filtertype: pattern
        kind: prefix
        value: does-not-match-
"#,
    )
    .unwrap();

    let client = EsClient::for_url(&server.uri()).unwrap();
    let report = Runner::new(&client, false).run(&actions).await;
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_ignored_empty_list_succeeds_without_mutation() {
    let server = MockServer::start().await;
    mount_inventory(&server).await;

    let actions = ActionFile::parse(
        r#"
actions:
  1:
    action: delete_indices
    options:
      ignore_empty_list: true
    filters:
      - filtertype: pattern
        kind: prefix
        value: does-not-match-
"#,
    )
    .unwrap();

    let client = EsClient::for_url(&server.uri()).unwrap();
    let report = Runner::new(&client, false).run(&actions).await;
    assert_eq!(report.exit_code(), 0);

    let requests = server.received_requests().await.unwrap();
    assert!(!requests
        .iter()
        .any(|request| request.method.as_str() == "DELETE"));
}

// ── Dry-run surface ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dry_run_reads_but_never_mutates() {
    let server = MockServer::start().await;
    mount_inventory(&server).await;

    let actions = ActionFile::parse(
        r#"
actions:
  1:
    action: delete_indices
    filters:
      - filtertype: pattern
        kind: prefix
        value: logstash-
"#,
    )
    .unwrap();

    let client = EsClient::for_url(&server.uri()).unwrap();
    let report = Runner::new(&client, true).run(&actions).await;
    assert_eq!(report.exit_code(), 0);
    assert!(report.summary().contains("dry-run"));

    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|request| request.method.as_str() == "GET"));
}

// ── Disabled actions ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disabled_action_is_skipped() {
    let server = MockServer::start().await;

    let actions = ActionFile::parse(
        r#"
actions:
  1:
    action: delete_indices
    options:
      disable_action: true
    filters:
      - filtertype: none
"#,
    )
    .unwrap();

    let client = EsClient::for_url(&server.uri()).unwrap();
    let report = Runner::new(&client, false).run(&actions).await;
    assert_eq!(report.exit_code(), 0);
    assert!(report.summary().contains("disabled"));

    // Nothing at all hit the cluster.
    assert!(server.received_requests().await.unwrap().is_empty());
}
