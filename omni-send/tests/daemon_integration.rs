//! Integration tests for the omni-send daemon

use assert_cmd::Command;
use chrono::{Duration, Utc};
use libomnipost::{Database, Post, PostStatus, PostStore};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Setup test environment with config and database
async fn setup_test_env(extra_config: &str) -> (TempDir, String, Database) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("test.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[scheduler]
poll_interval = 1
publish_timeout = 5
{}
"#,
        db_path.display().to_string().replace('\\', "/"),
        extra_config
    );
    fs::write(&config_path, config_content).unwrap();

    let db = Database::new(db_path.to_str().unwrap()).await.unwrap();

    (temp_dir, config_path.to_str().unwrap().to_string(), db)
}

/// Create a post that came due a minute ago
async fn create_due_post(db: &Database, platform: &str, retry_count: u32) -> String {
    let mut post = Post::scheduled(
        "Test scheduled post".to_string(),
        vec![platform.to_string()],
        Utc::now() - Duration::seconds(60),
    );
    post.retry_count = retry_count;
    db.create_post(&post).await.unwrap();
    post.id
}

fn omni_send(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("omni-send").unwrap();
    cmd.env("OMNIPOST_CONFIG", config_path)
        .env_remove("OMNIPOST_DB_PATH")
        .env_remove("RUST_LOG")
        .env("OMNIPOST_LOG_FORMAT", "text");
    cmd
}

fn log_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// STARTUP

#[tokio::test]
async fn test_once_with_empty_queue() {
    let (_temp_dir, config_path, _db) = setup_test_env("").await;

    omni_send(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("omni-send daemon starting"))
        .stderr(predicate::str::contains("processed due posts once, exiting"));
}

#[tokio::test]
async fn test_invalid_config_is_exit_code_2() {
    let temp_dir = TempDir::new().unwrap();
    let invalid_config = temp_dir.path().join("invalid.toml");
    fs::write(&invalid_config, "invalid toml content [[[").unwrap();

    omni_send(invalid_config.to_str().unwrap())
        .arg("--once")
        .assert()
        .failure()
        .code(2);
}

#[tokio::test]
async fn test_zero_poll_interval_rejected() {
    let (_temp_dir, config_path, _db) = setup_test_env("").await;

    omni_send(&config_path)
        .args(["--once", "--poll-interval", "0"])
        .assert()
        .failure()
        .code(3);
}

#[tokio::test]
async fn test_verbose_logging() {
    let (_temp_dir, config_path, _db) = setup_test_env("").await;

    omni_send(&config_path)
        .args(["--once", "--verbose", "--poll-interval", "30"])
        .assert()
        .success()
        .stderr(predicate::str::contains("30s"));
}

// POST PROCESSING

#[tokio::test]
async fn test_missing_credentials_schedule_retry() {
    let (_temp_dir, config_path, db) = setup_test_env("").await;
    let post_id = create_due_post(&db, "twitter", 0).await;

    let before = Utc::now();
    let output = omni_send(&config_path).arg("--once").output().unwrap();
    assert!(output.status.success());

    let lines = log_lines(&output.stdout);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["event"], "publish_error");
    assert_eq!(lines[0]["platform_id"], "twitter");
    assert_eq!(lines[0]["post_id"], post_id.as_str());
    assert_eq!(lines[0]["retry_count"], 1);

    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.retry_count, 1);
    assert_eq!(post.last_error.as_deref(), Some("temporary_bad_request"));
    assert!(post.scheduled_at >= before + Duration::milliseconds(15_000));
    assert!(post.scheduled_at <= Utc::now() + Duration::milliseconds(20_000));
}

#[tokio::test]
async fn test_unknown_platform_is_adapter_missing() {
    let (_temp_dir, config_path, db) = setup_test_env("").await;
    let post_id = create_due_post(&db, "myspace", 0).await;

    let output = omni_send(&config_path).arg("--once").output().unwrap();
    let lines = log_lines(&output.stdout);
    assert_eq!(lines[0]["event"], "adapter_missing");

    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.last_error.as_deref(), Some("adapter_missing"));
}

#[tokio::test]
async fn test_disabled_adapters_resolve_nothing() {
    let (_temp_dir, config_path, db) = setup_test_env("\n[adapters]\nenabled = false\n").await;
    create_due_post(&db, "twitter", 0).await;

    let output = omni_send(&config_path).arg("--once").output().unwrap();
    let lines = log_lines(&output.stdout);
    assert_eq!(lines[0]["event"], "adapter_missing");
}

#[tokio::test]
async fn test_exhausted_retries_fail() {
    let (_temp_dir, config_path, db) = setup_test_env("").await;
    let post_id = create_due_post(&db, "twitter", 3).await;

    omni_send(&config_path).arg("--once").assert().success();

    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Failed);
    assert_eq!(post.retry_count, 4);
}

#[tokio::test]
async fn test_future_posts_untouched() {
    let (_temp_dir, config_path, db) = setup_test_env("").await;
    let post = Post::scheduled(
        "Later".to_string(),
        vec!["twitter".to_string()],
        Utc::now() + Duration::hours(1),
    );
    db.create_post(&post).await.unwrap();

    omni_send(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let stored = db.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Scheduled);
    assert_eq!(stored.retry_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_webhook_publish_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let (_temp_dir, config_path, db) = setup_test_env(&format!(
        "\n[platforms.discord]\nwebhook_url = \"{}\"\n",
        server.uri()
    ))
    .await;
    let first = create_due_post(&db, "discord", 0).await;
    let second = create_due_post(&db, "Discord", 2).await;

    let output = omni_send(&config_path).arg("--once").output().unwrap();
    assert!(output.status.success());

    let lines = log_lines(&output.stdout);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l["event"] == "publish_success"));

    for id in [first, second] {
        let post = db.get_post(&id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Published);
        assert!(post.last_error.is_none());
    }
}
