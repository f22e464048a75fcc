//! Inventory assembly against a stubbed cluster.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use curator_client::{EsClient, IndexState};

async fn mount_inventory_stubs(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/_all/_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logstash-2017.04.04": {
                "settings": {
                    "index": {
                        "creation_date": "1491264000000",
                        "number_of_shards": "3",
                        "lifecycle": { "name": "logs-policy" },
                        "routing": {
                            "allocation": { "require": { "box_type": "warm" } }
                        }
                    }
                }
            },
            "closed-index": {
                "settings": {
                    "index": {
                        "creation_date": "1491000000000",
                        "number_of_shards": "1",
                        "hidden": "false"
                    }
                }
            },
            ".hidden-status": {
                "settings": {
                    "index": {
                        "creation_date": "1491000000000",
                        "number_of_shards": "1",
                        "hidden": "true"
                    }
                }
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/_cat/indices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "index": "logstash-2017.04.04", "status": "open" },
            { "index": "closed-index", "status": "close" },
            { "index": ".hidden-status", "status": "open" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/_all/_stats/docs,store"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indices": {
                "logstash-2017.04.04": {
                    "primaries": { "docs": { "count": 1200 } },
                    "total": { "store": { "size_in_bytes": 10_000_000_000u64 } }
                }
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/_all/_alias"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logstash-2017.04.04": { "aliases": { "logs-read": {} } }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/_data_stream"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data_streams": [] })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_inventory_assembles_all_sources() {
    let server = MockServer::start().await;
    mount_inventory_stubs(&server).await;

    let client = EsClient::for_url(&server.uri()).unwrap();
    let inventory = client.inventory().await.unwrap();
    assert_eq!(inventory.len(), 3);

    let logstash = inventory
        .iter()
        .find(|index| index.name == "logstash-2017.04.04")
        .unwrap();
    assert_eq!(logstash.state, IndexState::Open);
    assert_eq!(logstash.creation_date_ms, 1491264000000);
    assert_eq!(logstash.number_of_shards, 3);
    assert_eq!(logstash.docs_count, 1200);
    assert_eq!(logstash.size_bytes, 10_000_000_000);
    assert!(logstash.aliases.contains("logs-read"));
    assert_eq!(logstash.ilm_policy.as_deref(), Some("logs-policy"));
    assert_eq!(
        logstash.routing_allocation.get("require.box_type"),
        Some(&"warm".to_string())
    );
    assert!(!logstash.hidden);

    let closed = inventory
        .iter()
        .find(|index| index.name == "closed-index")
        .unwrap();
    assert_eq!(closed.state, IndexState::Close);
    // Closed indices report no stats.
    assert_eq!(closed.size_bytes, 0);

    let hidden = inventory
        .iter()
        .find(|index| index.name == ".hidden-status")
        .unwrap();
    assert!(hidden.hidden);
}

#[tokio::test]
async fn test_error_body_becomes_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_snapshot/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "type": "repository_missing_exception",
                "reason": "[missing] missing"
            },
            "status": 404
        })))
        .mount(&server)
        .await;

    let client = EsClient::for_url(&server.uri()).unwrap();
    assert!(!client.repository_exists("missing").await.unwrap());
}

#[tokio::test]
async fn test_master_only_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_nodes/_local"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nodes": { "node-a": { "name": "node-a" } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_cluster/state/master_node"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "master_node": "node-a"
        })))
        .mount(&server)
        .await;

    let client = EsClient::for_url(&server.uri()).unwrap();
    assert!(client.is_elected_master().await.unwrap());
}
