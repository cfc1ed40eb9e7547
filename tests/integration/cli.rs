//! Command line surface

use assert_cmd::Command;
use tempfile::TempDir;

fn harvester() -> Command {
    let mut cmd = Command::cargo_bin("repo-harvester").unwrap();
    cmd.env_remove("GITHUB_TOKEN").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_missing_owner_is_a_usage_error() {
    let output = harvester().output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--owner"), "stderr: {stderr}");
}

#[test]
fn test_cache_run_without_network() {
    let dir = TempDir::new().unwrap();

    let output = harvester()
        .args(["--owner", "grimoirelab", "--cache", "--api-url", "http://127.0.0.1:1"])
        .arg("--storage-dir")
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_project_file_written() {
    let dir = TempDir::new().unwrap();

    let output = harvester()
        .args(["--owner", "grimoirelab", "--cache", "-m"])
        .arg("--storage-dir")
        .arg(dir.path().join("storage"))
        .arg("--output-dir")
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let written = std::fs::read_to_string(dir.path().join("grimoirelab-projects.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value["grimoirelab"]["git"], serde_json::json!([]));
}

#[test]
fn test_unwritable_storage_exits_with_failure() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "file").unwrap();

    let output = harvester()
        .args(["--owner", "grimoirelab", "--cache"])
        .arg("--storage-dir")
        .arg(&blocker)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
}
