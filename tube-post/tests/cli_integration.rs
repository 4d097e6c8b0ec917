//! Integration tests for tube-post

use assert_cmd::Command;
use libtubecast::{Database, PostStatus, PrivacyStatus};
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Config pointing the database and upload dir into a temp directory
fn setup_test_env() -> (TempDir, String, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("schedule.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[storage]
upload_dir = "{}"

[youtube]
default_privacy = "unlisted"
"#,
        db_path.display().to_string().replace('\\', "/"),
        temp_dir.path().join("uploads").display().to_string().replace('\\', "/")
    );
    fs::write(&config_path, config_content).unwrap();

    (
        temp_dir,
        config_path.to_str().unwrap().to_string(),
        db_path,
    )
}

fn write_video(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, b"fake video").unwrap();
    path
}

fn tube_post(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("tube-post").unwrap();
    cmd.env("TUBECAST_CONFIG", config_path)
        .env_remove("TUBECAST_DB_PATH")
        .env_remove("RUST_LOG");
    cmd
}

#[tokio::test]
async fn test_schedule_prints_id_and_creates_pending_post() {
    let (temp_dir, config_path, db_path) = setup_test_env();
    let video = write_video(&temp_dir, "talk.mp4");

    let output = tube_post(&config_path)
        .arg(&video)
        .args(["--title", "My talk", "--tags", "a, b,, c", "--at", "2026-03-01T15:00:00Z"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let id: i64 = String::from_utf8(output.stdout)
        .unwrap()
        .trim()
        .parse()
        .expect("stdout is the post id");

    let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
    let post = db.get_post(id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Pending);
    assert_eq!(post.title, "My talk");
    assert_eq!(post.tags, vec!["a", "b", "c"]);
    // Config default applies when --privacy is omitted
    assert_eq!(post.privacy_status, PrivacyStatus::Unlisted);
    assert_eq!(post.scheduled_at.to_rfc3339(), "2026-03-01T15:00:00+00:00");
    assert!(PathBuf::from(&post.video_path).exists());
}

#[test]
fn test_json_output() {
    let (temp_dir, config_path, _db_path) = setup_test_env();
    let video = write_video(&temp_dir, "clip.mov");

    let output = tube_post(&config_path)
        .arg(&video)
        .args(["--at", "30m", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json["id"].is_i64());
    assert_eq!(json["title"], "Untitled video");
    assert_eq!(json["status"], "pending");
}

#[test]
fn test_missing_video_is_invalid_input() {
    let (_temp_dir, config_path, _db_path) = setup_test_env();

    tube_post(&config_path)
        .args(["--at", "1h"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("No video file was sent"));
}

#[test]
fn test_missing_time_is_invalid_input() {
    let (temp_dir, config_path, _db_path) = setup_test_env();
    let video = write_video(&temp_dir, "talk.mp4");

    tube_post(&config_path)
        .arg(&video)
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Scheduled time is required"));
}

#[test]
fn test_bad_privacy_is_invalid_input() {
    let (temp_dir, config_path, _db_path) = setup_test_env();
    let video = write_video(&temp_dir, "talk.mp4");

    tube_post(&config_path)
        .arg(&video)
        .args(["--at", "1h", "--privacy", "friends"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Invalid privacy status"));
}

#[tokio::test]
async fn test_rejected_submission_creates_nothing() {
    let (temp_dir, config_path, db_path) = setup_test_env();
    let video = write_video(&temp_dir, "talk.mp4");

    tube_post(&config_path)
        .arg(&video)
        .args(["--at", "whenever"])
        .assert()
        .failure()
        .code(3);

    let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
    assert!(db.list_posts().await.unwrap().is_empty());
    assert!(!temp_dir.path().join("uploads").exists()
        || fs::read_dir(temp_dir.path().join("uploads")).unwrap().count() == 0);
}

#[test]
fn test_invalid_config_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("broken.toml");
    fs::write(&config_path, "invalid toml [[[").unwrap();
    let video = write_video(&temp_dir, "talk.mp4");

    tube_post(config_path.to_str().unwrap())
        .arg(&video)
        .args(["--at", "1h"])
        .assert()
        .failure()
        .code(2);
}
