//! End-to-end tests for the command-line front end

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_VAR: &str = "MEDIMIND_CLI_TEST_TOKEN";

fn config_file(base_url: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[endpoint]
base_url = "{base_url}"

[stream]
debounce_ms = 5

[retry]
base_delay_ms = 10
max_delay_ms = 20
max_retries = 0

[auth]
token_env = "{TOKEN_VAR}"
"#
    )
    .unwrap();
    file
}

#[test]
fn test_help_lists_options() {
    Command::cargo_bin("medimind-stream")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--endpoint"))
        .stdout(predicate::str::contains("--no-filter"));
}

#[test]
fn test_missing_token_fails_with_auth_error() {
    let config = config_file("http://127.0.0.1:9");
    Command::cargo_bin("medimind-stream")
        .unwrap()
        .env_remove(TOKEN_VAR)
        .args(["--config", config.path().to_str().unwrap()])
        .args(["--endpoint", "flow-1", "What is a fever?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authentication failed"));
}

#[test]
fn test_invalid_config_is_reported() {
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, "[stream\ntimeout_secs = ").unwrap();
    Command::cargo_bin("medimind-stream")
        .unwrap()
        .args(["--config", config.path().to_str().unwrap()])
        .args(["--endpoint", "flow-1", "q"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid TOML"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_streams_answer_and_sources_to_stdout() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: token\ndata: Rest and \n\n",
        "event: token\ndata: drink fluids.\n\n",
        "event: sourceDocuments\ndata: [{\"title\":\"NHS: Common cold\"}]\n\n",
        "event: end\ndata: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/v1/prediction/flow-1"))
        .and(header("authorization", "Bearer cli-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let config = config_file(&server.uri());
    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("medimind-stream")
            .unwrap()
            .env(TOKEN_VAR, "cli-secret")
            .args(["--config", config.path().to_str().unwrap()])
            .args(["--endpoint", "flow-1", "How do I treat a cold?"])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("Rest and drink fluids."))
        .stdout(predicate::str::contains("[1] NHS: Common cold"));
}
