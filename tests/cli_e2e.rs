//! End-to-end CLI tests for the image-downloader binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("image-downloader").unwrap();
    cmd.env_remove("RUST_LOG");
    for var in [
        "IMAGE_DOWNLOADER_OUTPUT_DIR",
        "IMAGE_DOWNLOADER_CONCURRENCY",
        "IMAGE_DOWNLOADER_MAX_RETRIES",
        "IMAGE_DOWNLOADER_MAX_PAYLOAD_BYTES",
        "IMAGE_DOWNLOADER_TIMEOUT_SECS",
        "IMAGE_DOWNLOADER_RETRY_BASE_MS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Test that the binary with no input exits with code 0.
#[test]
fn test_binary_without_input_returns_zero() {
    bin().write_stdin("").assert().success();
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Download a list of image URLs"))
        .stdout(predicate::str::contains("IMAGE_DOWNLOADER_CONCURRENCY"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("image-downloader"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    bin()
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}

#[test]
fn test_binary_rejects_out_of_range_env_concurrency() {
    bin()
        .env("IMAGE_DOWNLOADER_CONCURRENCY", "0")
        .arg("https://example.com/a.jpg")
        .assert()
        .failure();
}

#[test]
fn test_binary_missing_input_file_is_setup_error() {
    let temp_dir = TempDir::new().unwrap();
    bin()
        .args(["--input", "/nonexistent/list.csv", "-o"])
        .arg(temp_dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("/nonexistent/list.csv"));
}

#[test]
fn test_binary_invalid_reference_gives_partial_exit_and_report() {
    let temp_dir = TempDir::new().unwrap();
    bin()
        .args(["-q", "-o"])
        .arg(temp_dir.path())
        .arg("ftp://example.com/a.jpg")
        .assert()
        .code(2);

    let report = std::fs::read_to_string(temp_dir.path().join("download_errors.csv")).unwrap();
    assert!(report.starts_with("reference,name,error\n"));
    assert!(report.contains("ftp://example.com/a.jpg"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_downloads_listing_and_prints_json() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("out");

    Mock::given(method("GET"))
        .and(path("/img/1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG))
        .mount(&mock_server)
        .await;

    let listing = temp_dir.path().join("list.csv");
    std::fs::write(
        &listing,
        format!("url,name\n{}/img/1,Red Shoe\n", mock_server.uri()),
    )
    .unwrap();

    let assert = bin()
        .env("IMAGE_DOWNLOADER_OUTPUT_DIR", &out_dir)
        .args(["--json", "-q", "--input"])
        .arg(&listing)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["cancelled_by_user"], false);
    assert_eq!(std::fs::read(out_dir.join("Red Shoe.png")).unwrap(), PNG);
    assert!(!out_dir.join("download_errors.csv").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_reads_stdin_and_prints_summary() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/ok.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("<html></html>"),
        )
        .mount(&mock_server)
        .await;

    let base = mock_server.uri();
    bin()
        .arg("-o")
        .arg(temp_dir.path())
        .write_stdin(format!("{base}/ok.png\n{base}/page\n"))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("1 of 2 downloaded, 1 failed"))
        .stdout(predicate::str::contains("Failure report:"));

    assert!(temp_dir.path().join("ok.png").exists());
}
