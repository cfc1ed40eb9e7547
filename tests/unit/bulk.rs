//! Unit tests for the bulk write sink

use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use repo_harvester::index::{build_bulk_body, BulkSink};
use repo_harvester::ResourceRecord;

use crate::support::record;

#[tokio::test]
async fn test_empty_batch_is_not_submitted() {
    // Nothing listens on port 1; any request would fail
    let sink = BulkSink::new(Arc::new(Client::new()), "http://127.0.0.1:1/github_raw/");
    let items: Vec<ResourceRecord> = Vec::new();

    assert_eq!(sink.submit(&items, "name").await.unwrap(), 0);
    assert_eq!(sink.bulk_url(), "http://127.0.0.1:1/github_raw/state/_bulk");
}

#[tokio::test]
async fn test_unreachable_index_is_an_error() {
    let sink = BulkSink::new(Arc::new(Client::new()), "http://127.0.0.1:1/github_raw");
    let items = vec![record("perceval", "2024-01-01T00:00:00Z", 3, false)];

    assert!(sink.submit(&items, "name").await.is_err());
}

#[test]
fn test_one_directive_per_document() {
    let items: Vec<_> = (0..3).map(|i| json!({"name": format!("r{i}"), "size": i})).collect();
    let body = build_bulk_body(&items, "name").unwrap().unwrap();

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 6);
    for (i, pair) in lines.chunks(2).enumerate() {
        assert_eq!(pair[0], format!(r#"{{"index" : {{"_id" : "r{i}" }} }}"#));
        assert_eq!(serde_json::from_str::<serde_json::Value>(pair[1]).unwrap(), items[i]);
    }
}
