//! Backend mode selection and state commits

use repo_harvester::cache::CacheLayer;
use repo_harvester::fetcher::github_config::GITHUB_CONFIG;
use repo_harvester::harvester::{Backend, BackendMode, BackendOptions, HarvestError};
use repo_harvester::output::{project_descriptor, project_file_name, write_project_file};
use repo_harvester::resume::{BackendState, IncrementalStateStore, SyncPoint};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

use crate::support::{github_source, page, refused, repo_json, ScriptedTransport};

fn state_store(root: &Path) -> IncrementalStateStore {
    IncrementalStateStore::new(root.join("github").join("grimoirelab").join("state"))
}

fn seed_state(root: &Path, at: &str) -> IncrementalStateStore {
    let store = state_store(root);
    let state = BackendState::new(
        "github:grimoirelab",
        SyncPoint::timestamp(at.parse().unwrap()),
        "name",
        2,
    );
    store.persist("github:grimoirelab", &state).unwrap();
    store
}

#[test]
fn test_cache_forces_incremental_off() {
    let dir = TempDir::new().unwrap();
    seed_state(dir.path(), "2024-01-01T00:00:00Z");
    let transport = ScriptedTransport::new(vec![]);

    let backend = Backend::new(
        github_source("grimoirelab", 0, &transport),
        dir.path(),
        BackendOptions {
            use_cache: true,
            incremental: true,
        },
    )
    .unwrap();

    assert_eq!(backend.mode(), BackendMode::CacheReplay);
    assert!(!backend.is_incremental());
    assert!(backend.state().is_none());
}

#[test]
fn test_missing_state_degrades_to_fresh() {
    let dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new(vec![]);

    let backend = Backend::new(
        github_source("grimoirelab", 0, &transport),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();

    assert_eq!(backend.mode(), BackendMode::Fresh);
    assert!(!backend.is_incremental());
    assert_eq!(backend.backend_id(), "github:grimoirelab");
}

#[test]
fn test_corrupt_state_degrades_to_fresh() {
    let dir = TempDir::new().unwrap();
    let store = state_store(dir.path());
    std::fs::create_dir_all(store.dir()).unwrap();
    std::fs::write(store.path_for("github:grimoirelab"), "{ broken").unwrap();
    let transport = ScriptedTransport::new(vec![]);

    let backend = Backend::new(
        github_source("grimoirelab", 0, &transport),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();

    assert_eq!(backend.mode(), BackendMode::Fresh);
}

#[test]
fn test_stored_state_resumes() {
    let dir = TempDir::new().unwrap();
    seed_state(dir.path(), "2024-01-01T00:00:00Z");
    let transport = ScriptedTransport::new(vec![]);

    let backend = Backend::new(
        github_source("grimoirelab", 0, &transport),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();

    assert_eq!(backend.mode(), BackendMode::Resuming);
    assert!(backend.is_incremental());
    assert_eq!(
        backend.state().unwrap().last_sync().unwrap().to_rfc3339(),
        "2024-01-01T00:00:00+00:00"
    );
}

#[test]
fn test_fresh_entry_clears_cache() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("github").join("grimoirelab").join("cache");
    let stale = CacheLayer::open(&cache_dir, "name").unwrap();
    stale.put("stale", &json!({"name": "stale"})).unwrap();
    let transport = ScriptedTransport::new(vec![]);

    let backend = Backend::new(
        github_source("grimoirelab", 0, &transport),
        dir.path(),
        BackendOptions {
            use_cache: false,
            incremental: false,
        },
    )
    .unwrap();

    assert_eq!(backend.mode(), BackendMode::Fresh);
    assert!(backend.cache().is_empty().unwrap());
}

#[test]
fn test_unwritable_storage_is_fatal() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();
    let transport = ScriptedTransport::new(vec![]);

    let result = Backend::new(
        github_source("grimoirelab", 0, &transport),
        &blocker,
        BackendOptions::default(),
    );

    assert!(matches!(result, Err(HarvestError::Storage { .. })));
}

#[tokio::test]
async fn test_complete_fetch_commits_newest_update() {
    let dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new(vec![page(
        &[
            repo_json("perceval", "2024-03-01T10:00:00Z", 300, false),
            repo_json("arthur", "2024-02-01T10:00:00Z", 10, false),
            repo_json("fork", "2024-04-01T10:00:00Z", 1, true),
        ],
        None,
    )]);

    let mut backend = Backend::new(
        github_source("grimoirelab", 0, &transport),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();
    let outcome = backend.fetch().await.unwrap();

    let names: Vec<&str> = outcome.items.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["arthur", "perceval"]);
    assert!(outcome.complete && outcome.committed);

    // Forks are shaped away but still count towards the sync point
    let state = state_store(dir.path()).restore("github:grimoirelab").unwrap();
    assert_eq!(state.last_sync().unwrap().to_rfc3339(), "2024-04-01T10:00:00+00:00");
    assert_eq!(state.item_count(), 3);
    assert_eq!(backend.cache().len().unwrap(), 3);
}

#[tokio::test]
async fn test_empty_fetch_leaves_state_untouched() {
    let dir = TempDir::new().unwrap();
    let store = seed_state(dir.path(), "2024-05-01T00:00:00Z");
    let path = store.path_for("github:grimoirelab");
    let before = std::fs::read(&path).unwrap();

    // Nothing newer than the stored sync point
    let transport = ScriptedTransport::new(vec![page(
        &[repo_json("perceval", "2024-03-01T10:00:00Z", 300, false)],
        None,
    )]);
    let mut backend = Backend::new(
        github_source("grimoirelab", 0, &transport),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();
    let outcome = backend.fetch().await.unwrap();

    assert_eq!(outcome.mode, BackendMode::Resuming);
    assert!(outcome.items.is_empty());
    assert!(!outcome.committed);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_resuming_keeps_only_newer_records() {
    let dir = TempDir::new().unwrap();
    seed_state(dir.path(), "2024-02-15T00:00:00Z");
    let transport = ScriptedTransport::new(vec![page(
        &[
            repo_json("perceval", "2024-03-01T10:00:00Z", 300, false),
            repo_json("arthur", "2024-02-01T10:00:00Z", 10, false),
        ],
        None,
    )]);

    let mut backend = Backend::new(
        github_source("grimoirelab", 0, &transport),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();
    let outcome = backend.fetch().await.unwrap();

    let names: Vec<&str> = outcome.items.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["perceval"]);
    assert!(outcome.committed);
    assert_eq!(
        backend.state().unwrap().last_sync().unwrap().to_rfc3339(),
        "2024-03-01T10:00:00+00:00"
    );
}

#[tokio::test]
async fn test_interrupted_fetch_returns_partial_results_without_commit() {
    let dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new(vec![
        page(
            &[repo_json("perceval", "2024-03-01T10:00:00Z", 300, false)],
            Some("https://api.github.com/organizations/1/repos?page=2"),
        ),
        refused(),
    ]);

    let mut backend = Backend::new(
        github_source("grimoirelab", 0, &transport),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();
    let outcome = backend.fetch().await.unwrap();

    assert_eq!(outcome.items.len(), 1);
    assert!(!outcome.complete);
    assert!(!outcome.committed);
    assert!(state_store(dir.path()).restore("github:grimoirelab").is_err());
    // No user-endpoint retry after progress was made
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_unchanged_rerun_keeps_full_listing() {
    let dir = TempDir::new().unwrap();
    let listing = || {
        vec![page(
            &[
                repo_json("perceval", "2024-03-01T10:00:00Z", 300, false),
                repo_json("arthur", "2024-02-01T10:00:00Z", 10, false),
            ],
            None,
        )]
    };
    let project_file = dir.path().join(project_file_name("grimoirelab"));

    let first = ScriptedTransport::new(listing());
    let mut backend = Backend::new(
        github_source("grimoirelab", 0, &first),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();
    let outcome = backend.fetch().await.unwrap();
    assert_eq!(outcome.mode, BackendMode::Fresh);
    write_project_file(
        &project_file,
        &project_descriptor("grimoirelab", &GITHUB_CONFIG, &outcome.items),
    )
    .unwrap();
    let before = std::fs::read_to_string(&project_file).unwrap();

    // Same listing again: nothing updated since the committed sync point
    let second = ScriptedTransport::new(listing());
    let mut backend = Backend::new(
        github_source("grimoirelab", 0, &second),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();
    let outcome = backend.fetch().await.unwrap();
    assert_eq!(outcome.mode, BackendMode::Resuming);
    assert!(outcome.items.is_empty());

    let snapshot = backend.snapshot().unwrap();
    let names: Vec<&str> = snapshot.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["arthur", "perceval"]);

    write_project_file(
        &project_file,
        &project_descriptor("grimoirelab", &GITHUB_CONFIG, &snapshot),
    )
    .unwrap();
    assert_eq!(std::fs::read_to_string(&project_file).unwrap(), before);
}

#[tokio::test]
async fn test_snapshot_merges_resumed_changes() {
    let dir = TempDir::new().unwrap();
    let first = ScriptedTransport::new(vec![page(
        &[
            repo_json("perceval", "2024-03-01T10:00:00Z", 300, false),
            repo_json("arthur", "2024-02-01T10:00:00Z", 10, false),
        ],
        None,
    )]);
    Backend::new(github_source("grimoirelab", 0, &first), dir.path(), BackendOptions::default())
        .unwrap()
        .fetch()
        .await
        .unwrap();

    let second = ScriptedTransport::new(vec![page(
        &[
            repo_json("arthur", "2024-04-01T10:00:00Z", 500, false),
            repo_json("perceval", "2024-03-01T10:00:00Z", 300, false),
        ],
        None,
    )]);
    let mut backend = Backend::new(
        github_source("grimoirelab", 0, &second),
        dir.path(),
        BackendOptions::default(),
    )
    .unwrap();
    let outcome = backend.fetch().await.unwrap();
    assert_eq!(outcome.items.len(), 1);

    let snapshot = backend.snapshot().unwrap();
    let sizes: Vec<(&str, u64)> = snapshot.iter().map(|r| (r.name.as_str(), r.size)).collect();
    assert_eq!(sizes, vec![("perceval", 300), ("arthur", 500)]);
}
