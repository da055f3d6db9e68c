//! Integration tests for promptforge
//!
//! End-to-end runs against a fake upstream, plus CLI behavior.

use std::sync::Arc;

use assert_cmd::Command;
use axum::Json;
use axum::Router;
use axum::routing::post;
use predicates::prelude::*;
use promptforge::config::Config;
use promptforge::server::{AppState, router};
use promptforge::build_advisor;
use serde_json::{Value, json};
use serial_test::serial;
use tempfile::TempDir;

const API_KEY_ENV: &str = "PROMPTFORGE_IT_API_KEY";

// =============================================================================
// Fake upstream
// =============================================================================

/// Streams a recommendation in three frames; answers blocking calls with an intent
async fn fake_completions(Json(body): Json<Value>) -> axum::response::Response {
    use axum::response::IntoResponse;

    if body["stream"] == true {
        let frames = [
            r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"delta":{"content":"推荐如下：\n"}}]}"#,
            r#"{"choices":[{"delta":{"content":"{\"model\": \"DeepSeek-V3\", "}}]}"#,
            r#"{"choices":[{"delta":{"content":"\"prompt\": \"请写一首诗\"}"}}]}"#,
        ];
        let mut sse = String::new();
        for frame in frames {
            sse.push_str(&format!("data: {}\n\n", frame));
        }
        sse.push_str("data: [DONE]\n\n");
        ([("content-type", "text/event-stream")], sse).into_response()
    } else {
        let content = r#"{"should_continue": true, "reason": "需要调整", "user_intent": "更简洁", "continuation_type": "modification"}"#;
        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 20}
        }))
        .into_response()
    }
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn test_config(dir: &TempDir, upstream: &str) -> Config {
    std::fs::write(dir.path().join("default.txt"), "请推荐模型和提示词").unwrap();
    let mut config = Config::default();
    config.llm.base_url = upstream.to_string();
    config.llm.api_key_env = API_KEY_ENV.to_string();
    config.prompts.dir = dir.path().to_path_buf();
    config.server.static_dir = dir.path().join("public");
    config
}

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
#[serial]
async fn test_full_session_against_fake_upstream() {
    // SAFETY: serialized; no other test reads this variable
    unsafe { std::env::set_var(API_KEY_ENV, "test-key") };

    let upstream = spawn(Router::new().route("/v1/chat/completions", post(fake_completions))).await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = test_config(&dir, &upstream);

    let state = AppState {
        advisor: Arc::new(build_advisor(&config).unwrap()),
    };
    let base = spawn(router(state, &config.server.static_dir)).await;
    let http = reqwest::Client::new();

    let started: Value = http
        .post(format!("{}/api/session/start", base))
        .json(&json!({"userTask": "写一首诗"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = started["sessionId"].as_str().unwrap().to_string();
    assert_eq!(started["iterationCount"], 1);

    let response = http
        .post(format!("{}/api/recommend/stream", base))
        .json(&json!({"sessionId": id}))
        .send()
        .await
        .unwrap();
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    let body = response.text().await.unwrap();
    let frames: Vec<Value> = body
        .lines()
        .filter_map(|l| l.strip_prefix("data:"))
        .map(|d| serde_json::from_str(d.trim()).unwrap())
        .collect();

    let complete = frames.last().unwrap();
    assert!(frames.len() >= 2);
    assert_eq!(complete["type"], "complete");
    assert_eq!(complete["recommendation"]["model"], "DeepSeek-V3");
    assert_eq!(complete["recommendation"]["prompt"], "请写一首诗");

    let feedback: Value = http
        .post(format!("{}/api/analyze/feedback", base))
        .json(&json!({"sessionId": id, "userFeedback": "还不够好，能再调整一下吗"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feedback["shouldContinue"], true);
    assert_eq!(feedback["iterationCount"], 2);
    assert_eq!(feedback["analysis"]["continuation_type"], "modification");

    let export: Value = http
        .get(format!("{}/api/export/{}", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(export["finalRecommendation"]["model"], "DeepSeek-V3");
    assert_eq!(export["iterationCount"], 2);

    unsafe { std::env::remove_var(API_KEY_ENV) };
}

#[tokio::test]
#[serial]
async fn test_missing_api_key_surfaces_as_stream_error() {
    unsafe { std::env::remove_var(API_KEY_ENV) };

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = test_config(&dir, "http://127.0.0.1:9");
    let state = AppState {
        advisor: Arc::new(build_advisor(&config).unwrap()),
    };
    let base = spawn(router(state, &config.server.static_dir)).await;
    let http = reqwest::Client::new();

    let started: Value = http
        .post(format!("{}/api/session/start", base))
        .json(&json!({"userTask": "task"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let body = http
        .post(format!("{}/api/recommend/stream", base))
        .json(&json!({"sessionId": started["sessionId"]}))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains(r#""type":"error""#));
    assert!(body.contains("API调用失败"));
}

// =============================================================================
// CLI
// =============================================================================

fn pf(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pf").expect("pf binary");
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_parse_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reply.txt");
    std::fs::write(&path, "分析……\n{\"model\": \"GPT-4o\", \"prompt\": \"写诗\"}").unwrap();

    pf(&dir)
        .args(["parse", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"model\": \"GPT-4o\""));
}

#[test]
fn test_cli_parse_stdin() {
    let dir = TempDir::new().unwrap();
    pf(&dir)
        .args(["parse", "-"])
        .write_stdin(r#"{"model": "Claude", "prompt": "总结"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("Claude"));
}

#[test]
fn test_cli_parse_without_recommendation_fails() {
    let dir = TempDir::new().unwrap();
    pf(&dir)
        .arg("parse")
        .write_stdin("no json here")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No recommendation found"));
}

#[test]
fn test_cli_check() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("pf.yml");
    std::fs::write(
        &config,
        format!(
            "llm:\n  api-key-env: PROMPTFORGE_IT_CHECK_KEY\nprompts:\n  dir: {}\n",
            dir.path().display()
        ),
    )
    .unwrap();

    pf(&dir)
        .args(["-c", config.to_str().unwrap(), "check"])
        .env_remove("PROMPTFORGE_IT_CHECK_KEY")
        .assert()
        .failure()
        .stdout(predicate::str::contains("PROMPTFORGE_IT_CHECK_KEY is not set"));

    std::fs::write(dir.path().join("default.txt"), "template").unwrap();
    pf(&dir)
        .args(["-c", config.to_str().unwrap(), "check"])
        .env("PROMPTFORGE_IT_CHECK_KEY", "k")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"));
}

#[test]
fn test_cli_help_shows_configuration() {
    let dir = TempDir::new().unwrap();
    pf(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration:"));
}
