use std::fs::write;
use std::sync::{Arc, Mutex};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{NamedTempFile, TempDir};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OAUTH_VARS: [&str; 5] = [
    "OAUTH_ACCESS_TOKEN",
    "OAUTH_REFRESH_TOKEN",
    "OAUTH_CLIENT_ID",
    "OAUTH_CLIENT_SECRET",
    "OAUTH_TOKEN_URI",
];

fn binary() -> Command {
    let mut cmd = Command::cargo_bin("media-backup").expect("Binary exists");
    for var in OAUTH_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn config_for(server: &MockServer) -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    let yaml = format!(
        "object_storage:\n  endpoint: \"{}\"\n  bucket: backups\nretry:\n  backoff_unit_ms: 1\n",
        server.uri()
    );
    write(config.path(), yaml).expect("Writing temp config failed");
    config
}

#[test]
fn help_lists_both_commands() {
    binary()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("backup").and(predicate::str::contains("publish")));
}

#[test]
fn backup_without_files_is_a_usage_error() {
    binary()
        .args(["backup", "--config", "whatever.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FILES"));
}

#[test]
fn publish_rejects_unknown_privacy() {
    binary()
        .args(["publish", "--config", "c.yaml", "--title", "t", "--privacy", "secret", "v.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown privacy"));
}

#[test]
fn backup_with_missing_config_fails() {
    binary()
        .args(["backup", "--config", "/nonexistent/config.yaml", "clip.mp4"])
        .env("OAUTH_ACCESS_TOKEN", "token")
        .assert()
        .failure();
}

#[tokio::test(flavor = "multi_thread")]
async fn backup_uploads_small_file_and_prints_object_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/backups/o"))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", "ytd-backups/clip.mp4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let dir = TempDir::new().unwrap();
    let clip = dir.path().join("clip.mp4");
    write(&clip, b"not really a video").unwrap();

    let mut cmd = binary();
    cmd.arg("backup")
        .arg("--config")
        .arg(config.path())
        .arg(&clip)
        .env("OAUTH_ACCESS_TOKEN", "test-token");
    let assert = tokio::task::spawn_blocking(move || cmd.assert()).await.unwrap();
    assert
        .success()
        .stdout(predicate::str::contains("gs://backups/ytd-backups/clip.mp4").and(predicate::str::contains("1/1 files backed up")));
}

#[tokio::test(flavor = "multi_thread")]
async fn backup_exits_non_zero_when_a_file_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/backups/o"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden bucket"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let dir = TempDir::new().unwrap();
    let clip = dir.path().join("clip.mp4");
    write(&clip, b"abc").unwrap();

    let mut cmd = binary();
    cmd.arg("backup")
        .arg("--config")
        .arg(config.path())
        .arg(&clip)
        .env("OAUTH_ACCESS_TOKEN", "test-token");
    let assert = tokio::task::spawn_blocking(move || cmd.assert()).await.unwrap();
    assert
        .failure()
        .stdout(predicate::str::contains("forbidden bucket").and(predicate::str::contains("0/1 files backed up")));
}

/// Collects formatted events so tests can look for specific messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use media_backup::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Backup {
            config: std::path::PathBuf::from("dummy.yaml"),
            bucket: None,
            files: vec![std::path::PathBuf::from("clip.mp4")],
        },
    };

    assert!(run(cli).await.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
