use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use axum::extract::Path as UrlPath;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

fn wsk_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("wsk");
    path
}

/// A command running in an empty directory with no Weaviate settings in
/// the environment, so the default config path never resolves.
fn wsk(dir: &Path) -> Command {
    let mut cmd = Command::new(wsk_binary());
    cmd.current_dir(dir)
        .env_remove("WEAVIATE_URL")
        .env_remove("WEAVIATE_API_KEY")
        .env_remove("WSK_LOG");
    cmd
}

fn run(cmd: &mut Command) -> (Output, String, String) {
    let output = cmd.output().expect("failed to run wsk");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (output, stdout, stderr)
}

#[test]
fn test_filter_check_prints_native_json() {
    let tmp = TempDir::new().unwrap();
    let (out, stdout, stderr) = run(wsk(tmp.path()).args([
        "filter",
        "check",
        r#"[{"property":"price","operator":"less_than","value":50},{"property":"in_stock","operator":"equal","value":true}]"#,
    ]));
    assert!(out.status.success(), "stderr: {}", stderr);

    let native: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(native["operator"], "And");
    assert_eq!(native["operands"][0]["operator"], "LessThan");
    assert_eq!(native["operands"][0]["path"], json!(["price"]));
    assert_eq!(native["operands"][0]["valueInt"], 50);
    assert_eq!(native["operands"][1]["valueBoolean"], true);
}

#[test]
fn test_filter_check_graphql() {
    let tmp = TempDir::new().unwrap();
    let (out, stdout, _) = run(wsk(tmp.path()).args([
        "filter",
        "check",
        "--graphql",
        r#"{"property":"title","operator":"like","value":"*solar*"}"#,
    ]));
    assert!(out.status.success());
    assert_eq!(
        stdout.trim(),
        r#"{operator: Like, path: ["title"], valueText: "*solar*"}"#
    );
}

#[test]
fn test_filter_check_rejects_invalid() {
    let tmp = TempDir::new().unwrap();
    let (out, stdout, stderr) = run(wsk(tmp.path()).args([
        "filter",
        "check",
        r#"{"property":"year","operator":"between","value":1}"#,
    ]));
    assert!(!out.status.success());
    assert!(stdout.is_empty());
    assert!(stderr.contains("invalid filter"), "stderr: {}", stderr);
    assert!(stderr.contains("between"), "stderr: {}", stderr);
}

#[test]
fn test_filter_eval() {
    let tmp = TempDir::new().unwrap();
    let filter = r#"{"operator":"or","filters":[
        {"property":"year","operator":"greater_than","value":2010},
        {"property":"title","operator":"like","value":"Sol*"}
    ]}"#;

    let (out, stdout, _) = run(wsk(tmp.path()).args([
        "filter",
        "eval",
        filter,
        "--record",
        r#"{"year":1999,"title":"Solar"}"#,
    ]));
    assert!(out.status.success());
    assert_eq!(stdout.trim(), "true");

    let (out, stdout, _) = run(wsk(tmp.path()).args([
        "filter",
        "eval",
        filter,
        "--record",
        r#"{"year":1999,"title":"Wind"}"#,
    ]));
    assert!(out.status.success());
    assert_eq!(stdout.trim(), "false");
}

#[test]
fn test_filter_eval_missing_property() {
    let tmp = TempDir::new().unwrap();
    let filter = r#"{"property":"year","operator":"equal","value":2000}"#;

    let (out, stdout, _) = run(wsk(tmp.path()).args(["filter", "eval", filter, "--record", "{}"]));
    assert!(out.status.success());
    assert_eq!(stdout.trim(), "false");

    let (out, _, stderr) = run(wsk(tmp.path()).args([
        "filter",
        "eval",
        filter,
        "--record",
        "{}",
        "--strict-missing",
    ]));
    assert!(!out.status.success());
    assert!(stderr.contains("year"), "stderr: {}", stderr);
}

#[test]
fn test_filter_from_stdin() {
    let tmp = TempDir::new().unwrap();
    let mut child = wsk(tmp.path())
        .args(["filter", "check", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(br#"{"property":"id","operator":"equal","value":"abc"}"#)
        .unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success());
    let native: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(native["valueText"], "abc");
}

#[test]
fn test_fetch_rejects_bad_filter_before_connecting() {
    let tmp = TempDir::new().unwrap();
    let (out, _, stderr) = run(wsk(tmp.path()).args([
        "fetch",
        "Article",
        "--filters",
        r#"{"operator":"and","filters":[]}"#,
    ]));
    assert!(!out.status.success());
    assert!(stderr.contains("invalid filter"), "stderr: {}", stderr);
    assert!(!stderr.contains("WEAVIATE_URL"), "stderr: {}", stderr);
}

#[test]
fn test_fetch_rejects_id_with_filters() {
    let tmp = TempDir::new().unwrap();
    let (out, _, stderr) = run(wsk(tmp.path()).args([
        "fetch",
        "Article",
        "--id",
        "00000000-0000-0000-0000-000000000001",
        "--filters",
        r#"{"property":"year","operator":"equal","value":1}"#,
    ]));
    assert!(!out.status.success());
    assert!(stderr.contains("--id"), "stderr: {}", stderr);
}

#[test]
fn test_missing_weaviate_url() {
    let tmp = TempDir::new().unwrap();
    let (out, _, stderr) = run(wsk(tmp.path()).args(["collections", "list"]));
    assert!(!out.status.success());
    assert!(stderr.contains("WEAVIATE_URL"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_search_mode_is_a_usage_error() {
    let tmp = TempDir::new().unwrap();
    let (out, _, stderr) = run(wsk(tmp.path()).args([
        "search", "fuzzy", "--query", "x", "--collection", "Article",
    ]));
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr.contains("fuzzy"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_collection_properties() {
    let tmp = TempDir::new().unwrap();
    let (out, _, stderr) = run(wsk(tmp.path()).args([
        "collections",
        "create",
        "--name",
        "article",
        "--properties",
        r#"[{"name":"title","data_type":"string"}]"#,
    ]));
    assert!(!out.status.success());
    assert!(stderr.contains("invalid data_type 'string'"), "stderr: {}", stderr);
}

#[test]
fn test_bad_config_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("wsk.toml");
    fs::write(&path, "[search]\ndefault_alpha = 3.0\n").unwrap();
    let (out, _, stderr) = run(wsk(tmp.path()).args([
        "--config",
        path.to_str().unwrap(),
        "collections",
        "list",
    ]));
    assert!(!out.status.success());
    assert!(stderr.contains("default_alpha"), "stderr: {}", stderr);

    let missing = tmp.path().join("nope.toml");
    let (out, _, stderr) = run(wsk(tmp.path()).args([
        "--config",
        missing.to_str().unwrap(),
        "collections",
        "list",
    ]));
    assert!(!out.status.success());
    assert!(stderr.contains("nope.toml"), "stderr: {}", stderr);
}

#[test]
fn test_import_missing_file() {
    let tmp = TempDir::new().unwrap();
    let (out, _, stderr) = run(wsk(tmp.path()).args([
        "import",
        "missing.csv",
        "--collection",
        "Article",
    ]));
    assert!(!out.status.success());
    assert!(stderr.contains("File not found"), "stderr: {}", stderr);
}

// ── Against a mock cluster ──

async fn start_cluster() -> String {
    let app = Router::new()
        .route(
            "/v1/schema",
            get(|| async {
                Json(json!({"classes": [{
                    "class": "Article",
                    "description": "News",
                    "properties": [{"name": "title", "dataType": ["text"]}]
                }]}))
            }),
        )
        .route(
            "/v1/schema/{name}",
            get(|UrlPath(name): UrlPath<String>| async move {
                if name == "Article" {
                    (
                        StatusCode::OK,
                        Json(json!({
                            "class": "Article",
                            "properties": [{"name": "title", "dataType": ["text"]}]
                        })),
                    )
                } else {
                    (StatusCode::NOT_FOUND, Json(Value::Null))
                }
            }),
        )
        .route(
            "/v1/graphql",
            post(|| async {
                Json(json!({"data": {"Get": {"Article": [{
                    "title": "Solar | wind",
                    "_additional": {"id": "00000000-0000-0000-0000-000000000001", "creationTimeUnix": "0"}
                }]}}}))
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_commands_against_cluster() {
    let url = start_cluster().await;
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().to_path_buf();

    let (out, stdout, stderr) = tokio::task::spawn_blocking({
        let (dir, url) = (dir.clone(), url.clone());
        move || run(wsk(&dir).env("WEAVIATE_URL", url).args(["collections", "list"]))
    })
    .await
    .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr);
    assert!(stdout.starts_with("## Collections"), "{}", stdout);
    assert!(stdout.contains("| Article | News | title |"), "{}", stdout);

    let (out, stdout, stderr) = tokio::task::spawn_blocking({
        let (dir, url) = (dir.clone(), url.clone());
        move || {
            run(wsk(&dir)
                .env("WEAVIATE_URL", url)
                .args(["fetch", "Article", "--json"]))
        }
    })
    .await
    .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr);
    let objects: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(objects[0]["uuid"], "00000000-0000-0000-0000-000000000001");
    assert_eq!(objects[0]["properties"]["title"], "Solar | wind");

    let (out, _, stderr) = tokio::task::spawn_blocking(move || {
        run(wsk(&dir)
            .env("WEAVIATE_URL", url)
            .args(["collections", "get", "Missing"]))
    })
    .await
    .unwrap();
    assert!(!out.status.success());
    assert!(stderr.contains("Collection 'Missing' not found"), "stderr: {}", stderr);
}
