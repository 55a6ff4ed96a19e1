use assert_cmd::Command;
use predicates::str::contains;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Command isolated from the user's config, data dir, key and proxies.
fn streamchat(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("streamchat"));
    cmd.env_remove("STREAMCHAT_API_KEY")
        .env_remove("STREAMCHAT_URL")
        .env_remove("STREAMCHAT_CONFIG")
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("STREAMCHAT_DISABLE_SYSTEM_PROXY", "1");
    cmd
}

fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"content": delta}}]})
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn mount_stream(server: &MockServer, key: &str, deltas: &[&str]) {
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(header("authorization", format!("Bearer {key}").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(deltas), "text/event-stream"),
        )
        .mount(server)
        .await;
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    streamchat(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("StreamChat"));
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    streamchat(&home).arg("--version").assert().success();
}

#[test]
fn test_ask_without_api_key_fails() {
    let home = TempDir::new().unwrap();
    streamchat(&home)
        .args(["ask", "hello"])
        .assert()
        .failure()
        .stderr(contains("API key not found"))
        .stderr(contains("STREAMCHAT_API_KEY"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_streams_reply() {
    let server = MockServer::start().await;
    mount_stream(&server, "sk-test", &["Hel", "lo"]).await;
    let url = format!("{}{}", server.uri(), COMPLETIONS_PATH);

    let home = TempDir::new().unwrap();
    let mut cmd = streamchat(&home);
    cmd.args(["--api-key", "sk-test", "--url", &url, "ask", "hi"]);

    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert.success().stdout(contains("Hello"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_reports_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Authentication Fails"}})),
        )
        .mount(&server)
        .await;
    let url = format!("{}{}", server.uri(), COMPLETIONS_PATH);

    let home = TempDir::new().unwrap();
    let mut cmd = streamchat(&home);
    cmd.args(["--api-key", "sk-wrong", "--url", &url, "ask", "hi"]);

    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert.failure().stderr(contains("Authentication Fails"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_config_file_supplies_key_and_endpoint() {
    let server = MockServer::start().await;
    mount_stream(&server, "sk-file", &["from config"]).await;

    let home = TempDir::new().unwrap();
    let config_path = home.path().join("streamchat.toml");
    std::fs::write(
        &config_path,
        format!(
            "[default]\nurl = \"{}{}\"\n\n[api_keys]\ndeepseek = \"sk-file\"\n",
            server.uri(),
            COMPLETIONS_PATH
        ),
    )
    .unwrap();

    let mut cmd = streamchat(&home);
    cmd.arg("--config").arg(&config_path).args(["ask", "hi"]);

    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert.success().stdout(contains("from config"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_chat_keeps_history_across_turns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["hey"]), "text/event-stream"),
        )
        .mount(&server)
        .await;
    let url = format!("{}{}", server.uri(), COMPLETIONS_PATH);

    let home = TempDir::new().unwrap();
    let mut cmd = streamchat(&home);
    cmd.args([
        "--api-key",
        "sk-test",
        "--url",
        &url,
        "chat",
        "--system",
        "Be brief.",
    ])
    .write_stdin("hi\n/history\n/quit\n");

    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert
        .success()
        .stdout(contains("hey"))
        .stdout(contains("System: Be brief.\n\nUser: hi\n\nAssistant: hey\n\n"));
}
