//! End-to-end CLI tests for the attachment-bundler binary.

use assert_cmd::Command;
use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::{DOC_ID, mount_attachment, records_body, zip_entry_names};

/// Binary isolated from the caller's environment and config file.
fn bundler(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("attachment-bundler").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("GRIST_SERVER")
        .env_remove("GRIST_DOC_ID")
        .env_remove("GRIST_API_KEY")
        .env_remove("GRIST_ACCESS_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    bundler(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bundle every attachment"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    bundler(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("attachment-bundler"));
}

#[test]
fn test_binary_requires_row() {
    let home = TempDir::new().unwrap();
    bundler(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--row"));
}

#[test]
fn test_binary_missing_server_fails() {
    let home = TempDir::new().unwrap();
    bundler(&home)
        .args(["--row", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No server configured"));
}

#[test]
fn test_binary_rejects_invalid_config_file() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(&config, "concurrency = 99\n").unwrap();

    bundler(&home)
        .args(["--row", "1", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_writes_archive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/docs/{DOC_ID}/tables/Dossiers/records")))
        .respond_with(ResponseTemplate::new(200).set_body_json(records_body(
            3,
            json!({ "Client": "Leroy", "Docs": ["L", 1, 2] }),
        )))
        .mount(&server)
        .await;
    mount_attachment(&server, 1, b"first".to_vec(), "text/plain", None).await;
    mount_attachment(&server, 2, b"second".to_vec(), "text/plain", None).await;

    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    std::fs::create_dir_all(home.path().join("attachment-bundler")).unwrap();
    std::fs::write(
        home.path().join("attachment-bundler").join("config.toml"),
        format!(
            "server = \"{}\"\ndoc_id = \"{DOC_ID}\"\ntable = \"Dossiers\"\n",
            server.uri()
        ),
    )
    .unwrap();

    let mut cmd = bundler(&home);
    cmd.args(["--row", "3", "-a", "Docs", "-n", "Client", "--api-key", "k", "-q"])
        .arg("--output-dir")
        .arg(out.path());
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();

    output
        .assert()
        .success()
        .stdout(predicate::str::contains("2 fichier(s)"))
        .stdout(predicate::str::contains("Leroy.zip"));
    let bytes = std::fs::read(out.path().join("Leroy.zip")).unwrap();
    assert_eq!(
        zip_entry_names(&bytes),
        vec!["Docs_Leroy_1.txt", "Docs_Leroy_2.txt"]
    );
}
