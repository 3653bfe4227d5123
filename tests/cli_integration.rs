//! Integration tests for the `tn` CLI.
//!
//! Each test gets its own config directory, runs `tn` as a subprocess and
//! checks stdout. Commands that talk to the backend are pointed at a
//! loopback server that answers with canned JSON.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread::{self, JoinHandle};

use pretty_assertions::assert_eq;

/// Get the path to the built `tn` binary.
fn tn_bin() -> PathBuf {
    // cargo test builds to target/debug/
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("tn");
    path
}

/// Run `tn` with `config_home` as XDG_CONFIG_HOME, returning (stdout, stderr, success).
fn run_tn(config_home: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(tn_bin())
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("TASKNEST_API_URL")
        .env_remove("TASKNEST_LOG")
        .output()
        .expect("failed to run tn");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `tn` expecting success, return stdout.
fn run_tn_ok(config_home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_tn(config_home, args);
    if !success {
        panic!(
            "tn {:?} failed:\nstdout: {}\nstderr: {}",
            args, stdout, stderr
        );
    }
    stdout
}

/// Answer `replies.len()` requests in turn. The handle yields each raw
/// request line ("GET /todos HTTP/1.1") with its body appended.
fn serve(replies: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
                if line == "\r\n" {
                    break;
                }
            }
            let mut req_body = vec![0u8; content_length];
            reader.read_exact(&mut req_body).unwrap();

            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            seen.push(format!(
                "{} {}",
                request_line.trim_end(),
                String::from_utf8_lossy(&req_body)
            ));
        }
        seen
    });
    (url, handle)
}

const PROJECTS: &str = r#"[
    {"id": "p1", "keyword": "이사 준비", "items": [
        {"id": "a", "description": "짐 싸기", "is_completed": false, "priority": "high", "order": 0, "children": [
            {"id": "a1", "description": "주방", "is_completed": true, "order": 0, "children": []}
        ]},
        {"id": "b", "description": "전입 신고", "is_completed": false, "due_date": "2025-03-06T15:00:00", "order": 1, "children": []}
    ]},
    {"id": "p2", "keyword": "운동", "items": []}
]"#;

// ---------------------------------------------------------------------------
// Offline commands
// ---------------------------------------------------------------------------

#[test]
fn test_parse_text_output() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_tn_ok(
        tmp.path(),
        &["parse", "--now", "2025-03-05T14:10:20", "내일", "오후", "3시", "보고서", "작성"],
    );
    assert!(out.contains("description: 보고서 작성"));
    assert!(out.contains("priority:    none"));
    assert!(out.contains("due:         2025-03-06T15:00:00+09:00"));
    assert!(!out.contains("repeats"));
}

#[test]
fn test_parse_json() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_tn_ok(
        tmp.path(),
        &["parse", "--json", "--now", "2025-03-05T14:10:20", "매주 월요일 아침 9시 팀 회의"],
    );
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["description"], "팀 회의");
    assert_eq!(parsed["priority"], "none");
    assert_eq!(parsed["due_date"], "2025-03-10T09:00:00+09:00");
    assert_eq!(parsed["recurring"], "weekly");
}

#[test]
fn test_parse_rejects_bad_now() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (_, stderr, success) = run_tn(tmp.path(), &["parse", "--now", "yesterday", "장보기"]);
    assert!(!success);
    assert!(stderr.contains("invalid --now value"));
}

#[test]
fn test_examples_by_language() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_tn_ok(tmp.path(), &["examples"]);
    assert_eq!(out.lines().next(), Some("내일 오후 3시 보고서 작성"));

    let out = run_tn_ok(tmp.path(), &["examples", "--lang", "en", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert!(parsed.as_array().is_some_and(|a| !a.is_empty()));
}

#[test]
fn test_suggest_known_and_generic() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_tn_ok(tmp.path(), &["suggest", "여름", "여행"]);
    assert_eq!(out.lines().count(), 5);
    assert!(out.starts_with("1. 목적지 조사하기"));

    let out = run_tn_ok(tmp.path(), &["suggest", "--json", "빨래"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["subtasks"][0], "세부 계획 수립하기");
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[test]
fn test_config_set_get_path() {
    let tmp = tempfile::TempDir::new().unwrap();

    let path = run_tn_ok(tmp.path(), &["config", "path"]);
    assert_eq!(
        PathBuf::from(path.trim()),
        tmp.path().join("tasknest").join("config.toml")
    );

    let out = run_tn_ok(tmp.path(), &["config", "get", "api.base_url"]);
    assert_eq!(out.trim(), "http://localhost:8000");

    run_tn_ok(tmp.path(), &["config", "set", "api.base_url", "https://todo.example.com"]);
    run_tn_ok(tmp.path(), &["config", "set", "api.timeout_secs", "5"]);
    let out = run_tn_ok(tmp.path(), &["config", "get", "api.base_url"]);
    assert_eq!(out.trim(), "https://todo.example.com");

    let written = std::fs::read_to_string(tmp.path().join("tasknest/config.toml")).unwrap();
    assert!(written.contains("timeout_secs = 5"));
}

#[test]
fn test_config_rejects_unknown_key_and_bad_value() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (_, stderr, success) = run_tn(tmp.path(), &["config", "set", "api.color", "red"]);
    assert!(!success);
    assert!(stderr.contains("unknown config key"));

    let (_, stderr, success) = run_tn(tmp.path(), &["config", "set", "api.timeout_secs", "soon"]);
    assert!(!success);
    assert!(stderr.contains("invalid value"));
}

#[test]
fn test_prefs_set_show_unset() {
    let tmp = tempfile::TempDir::new().unwrap();
    assert_eq!(run_tn_ok(tmp.path(), &["prefs", "show"]).trim(), "{}");

    run_tn_ok(tmp.path(), &["prefs", "set", "view", "detailed"]);
    let out = run_tn_ok(tmp.path(), &["prefs", "set", "depth", "3"]);
    assert_eq!(out.trim(), "depth = 3");

    let out = run_tn_ok(tmp.path(), &["prefs", "show"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed, serde_json::json!({"view": "detailed", "depth": 3}));

    run_tn_ok(tmp.path(), &["prefs", "unset", "view"]);
    let (_, stderr, success) = run_tn(tmp.path(), &["prefs", "unset", "view"]);
    assert!(!success);
    assert!(stderr.contains("no preference named view"));

    run_tn_ok(tmp.path(), &["prefs", "clear"]);
    let storage = std::fs::read_to_string(tmp.path().join("tasknest/storage.json")).unwrap();
    assert!(!storage.contains("depth"));
}

// ---------------------------------------------------------------------------
// Backend commands
// ---------------------------------------------------------------------------

#[test]
fn test_projects_listing() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (url, server) = serve(vec![(200, PROJECTS)]);

    let out = run_tn_ok(tmp.path(), &["--api-url", &url, "projects"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("1  이사 준비"));
    assert!(lines[0].contains("1/3"));
    assert!(lines[1].ends_with("p2"));

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("GET /todos HTTP/1.1"));
}

#[test]
fn test_show_by_position() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (url, _server) = serve(vec![(200, PROJECTS)]);

    let out = run_tn_ok(tmp.path(), &["--api-url", &url, "show", "1"]);
    assert_eq!(
        out.lines().collect::<Vec<_>>(),
        vec![
            "이사 준비 (1/3)",
            "  [ ] 1 짐 싸기 🔴",
            "    [x] 1.1 주방",
            "  [ ] 2 전입 신고 (due 2025-03-06 15:00)",
        ]
    );
}

#[test]
fn test_show_missing_position() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (url, _server) = serve(vec![(200, PROJECTS)]);
    let (_, stderr, success) = run_tn(tmp.path(), &["--api-url", &url, "show", "7"]);
    assert!(!success);
    assert!(stderr.contains("no project at position 7"));
}

#[test]
fn test_unauthorized_reports_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (url, _server) = serve(vec![(401, r#"{"detail": "Not authenticated"}"#)]);
    let (_, stderr, success) = run_tn(tmp.path(), &["--api-url", &url, "projects"]);
    assert!(!success);
    assert!(stderr.contains("error: not signed in"));
}

#[test]
fn test_login_stores_token() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (url, server) = serve(vec![(200, r#"{"access_token": "tok-1", "token_type": "bearer"}"#)]);

    let out = run_tn_ok(
        tmp.path(),
        &["--api-url", &url, "login", "minji@example.com", "--password", "pw"],
    );
    assert_eq!(out.trim(), "signed in as minji");

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("POST /auth/login"));
    assert!(requests[0].contains("username=minji"));

    let storage = std::fs::read_to_string(tmp.path().join("tasknest/storage.json")).unwrap();
    assert!(storage.contains("tok-1"));
}

#[test]
fn test_edit_by_path_sends_partial_update() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (url, server) = serve(vec![(200, PROJECTS), (200, "{}")]);

    let out = run_tn_ok(
        tmp.path(),
        &["--api-url", &url, "edit", "1", "2", "전입", "신고하기"],
    );
    assert_eq!(out.trim(), "[ ] 2 전입 신고하기 (due 2025-03-06 15:00)");

    let requests = server.join().unwrap();
    assert!(requests[1].starts_with("PUT /todos/items/b HTTP/1.1"));
    assert!(requests[1].ends_with(r#"{"description":"전입 신고하기"}"#));
}
