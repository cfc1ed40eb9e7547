//! Cache replay without network access

use repo_harvester::harvester::{Backend, BackendMode, BackendOptions};
use serde_json::json;
use tempfile::TempDir;

use crate::support::{github_source, page, repo_json, ScriptedTransport};

const CACHE_ONLY: BackendOptions = BackendOptions {
    use_cache: true,
    incremental: false,
};

#[tokio::test]
async fn test_replay_matches_live_fetch() {
    let dir = TempDir::new().unwrap();
    let live_transport = ScriptedTransport::new(vec![page(
        &[
            repo_json("perceval", "2024-03-01T10:00:00Z", 300, false),
            repo_json("arthur", "2024-02-01T10:00:00Z", 10, false),
            repo_json("kingarthur", "2024-02-02T10:00:00Z", 20, true),
        ],
        None,
    )]);
    let mut live = Backend::new(
        github_source("grimoirelab", 0, &live_transport),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();
    let live_outcome = live.fetch().await.unwrap();

    let offline = ScriptedTransport::new(vec![]);
    let mut replay = Backend::new(github_source("grimoirelab", 0, &offline), dir.path(), CACHE_ONLY).unwrap();
    let replayed = replay.fetch().await.unwrap();

    assert_eq!(replayed.mode, BackendMode::CacheReplay);
    assert_eq!(replayed.items, live_outcome.items);
    assert!(!replayed.committed);
    assert_eq!(offline.call_count(), 0);
}

#[tokio::test]
async fn test_replay_collapses_duplicate_ids() {
    let dir = TempDir::new().unwrap();
    let offline = ScriptedTransport::new(vec![]);
    let mut backend = Backend::new(github_source("grimoirelab", 0, &offline), dir.path(), CACHE_ONLY).unwrap();

    let cache = backend.cache();
    cache
        .put("perceval", &repo_json("perceval", "2024-01-01T00:00:00Z", 100, false))
        .unwrap();
    cache
        .put("arthur", &repo_json("arthur", "2024-01-02T00:00:00Z", 50, false))
        .unwrap();
    cache
        .put("perceval", &repo_json("perceval", "2024-03-01T00:00:00Z", 5, false))
        .unwrap();

    let outcome = backend.fetch().await.unwrap();

    assert_eq!(outcome.items.len(), 2);
    let perceval = outcome.items.iter().find(|r| r.name == "perceval").unwrap();
    assert_eq!(perceval.size, 5);
    assert_eq!(outcome.items[0].name, "perceval");
}

#[tokio::test]
async fn test_replay_respects_max_count() {
    let dir = TempDir::new().unwrap();
    let offline = ScriptedTransport::new(vec![]);
    let mut backend = Backend::new(github_source("grimoirelab", 1, &offline), dir.path(), CACHE_ONLY).unwrap();
    backend
        .cache()
        .put_all(vec![
            ("old", &json!({"name": "old", "updated_at": "2020-01-01T00:00:00Z", "size": 1, "fork": false})),
            ("new", &json!({"name": "new", "updated_at": "2024-01-01T00:00:00Z", "size": 9, "fork": false})),
        ])
        .unwrap();

    let outcome = backend.fetch().await.unwrap();
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].name, "new");
}

#[tokio::test]
async fn test_replay_of_empty_cache() {
    let dir = TempDir::new().unwrap();
    let offline = ScriptedTransport::new(vec![]);
    let mut backend = Backend::new(github_source("grimoirelab", 0, &offline), dir.path(), CACHE_ONLY).unwrap();

    let outcome = backend.fetch().await.unwrap();
    assert!(outcome.items.is_empty());
    assert!(outcome.complete);
}
