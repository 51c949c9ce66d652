use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::Server;
use predicates::prelude::*;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration;
use tempfile::tempdir;

/// Serves one canned reply per connection after `delay`.
fn slow_server(delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { return };
            std::thread::spawn(move || {
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf);
                std::thread::sleep(delay);
                let _ = stream.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n");
            });
        }
    });
    format!("http://{}/", addr)
}

fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}

fn stdout_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}

#[test]
fn test_fetch_200() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/version")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_header("x-single", "foobar")
        .with_header("x-double", "1")
        .with_header("x-double", "2")
        .with_body("1.0.0")
        .create();
    let url = format!("{}/version", server.url());

    let output = Command::new(cargo::cargo_bin!("httpdata"))
        .arg("fetch")
        .arg(&url)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let state = stdout_json(&output);
    assert_eq!(state["id"], url.as_str());
    assert_eq!(state["response_body"], "1.0.0");
    assert_eq!(state["status_code"], 200);
    assert_eq!(state["response_headers"]["Content-Type"], "text/plain");
    assert_eq!(state["response_headers"]["X-Single"], "foobar");
    assert_eq!(state["response_headers"]["X-Double"], "1, 2");
    assert!(state["request_timeout"].is_null());
    assert!(state.get("response_body_base64_std").is_none());
}

#[test]
fn test_fetch_404() {
    let mut server = Server::new();
    let _mock = server.mock("GET", "/missing").with_status(404).create();

    let output = Command::new(cargo::cargo_bin!("httpdata"))
        .arg("fetch")
        .arg(format!("{}/missing", server.url()))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let state = stdout_json(&output);
    assert_eq!(state["response_body"], "");
    assert_eq!(state["status_code"], 404);
}

#[test]
fn test_fetch_with_authorization_header() {
    let mut server = Server::new();
    let _ok = server
        .mock("GET", "/restricted")
        .match_header("authorization", "Zm9vOmJhcg==")
        .with_status(200)
        .with_body("authorized")
        .create();
    let _forbidden = server
        .mock("GET", "/restricted")
        .match_header("authorization", mockito::Matcher::Missing)
        .with_status(403)
        .create();

    Command::new(cargo::cargo_bin!("httpdata"))
        .arg("fetch")
        .arg(format!("{}/restricted", server.url()))
        .arg("-H")
        .arg("Authorization=Zm9vOmJhcg==")
        .assert()
        .success()
        .stdout(predicates::str::contains("\"authorized\""));

    Command::new(cargo::cargo_bin!("httpdata"))
        .arg("fetch")
        .arg(format!("{}/restricted", server.url()))
        .assert()
        .success()
        .stdout(predicates::str::contains("403"));
}

#[test]
fn test_fetch_content_type_warnings() {
    let mut server = Server::new();
    let _charset = server
        .mock("GET", "/charset")
        .with_status(200)
        .with_header("content-type", "application/json; charset=UTF-16")
        .with_body("content type ok, charset not ok")
        .create();
    let _binary = server
        .mock("GET", "/binary")
        .with_status(200)
        .with_header("content-type", "application/x-x509-ca-cert")
        .with_body("content type not ok")
        .create();
    let _text = server
        .mock("GET", "/text")
        .with_status(200)
        .with_header("content-type", "text/plain; charset=UTF-8")
        .with_body("text")
        .create();

    for (path, body) in [
        ("/charset", "content type ok, charset not ok"),
        ("/binary", "content type not ok"),
    ] {
        Command::new(cargo::cargo_bin!("httpdata"))
            .arg("fetch")
            .arg(format!("{}{}", server.url(), path))
            .assert()
            .success()
            .stdout(predicates::str::contains(body))
            .stderr(predicates::str::contains(
                "Content-Type is not recognized as a text type",
            ));
    }

    Command::new(cargo::cargo_bin!("httpdata"))
        .arg("fetch")
        .arg(format!("{}/text", server.url()))
        .assert()
        .success()
        .stdout(predicates::str::contains("text/plain; charset=UTF-8"))
        .stderr(predicates::str::contains("Content-Type").not());
}

#[test]
fn test_fetch_timeout() {
    let url = slow_server(Duration::from_millis(500));

    Command::new(cargo::cargo_bin!("httpdata"))
        .arg("fetch")
        .arg(&url)
        .arg("--timeout")
        .arg("5")
        .assert()
        .failure()
        .stderr(predicates::str::contains(
            "The request exceeded the specified timeout: 5 ms",
        ));
}

#[test]
fn test_fetch_retry_exhaustion() {
    let url = closed_port_url();

    Command::new(cargo::cargo_bin!("httpdata"))
        .arg("fetch")
        .arg(&url)
        .arg("--retry-attempts")
        .arg("1")
        .arg("--retry-min-delay")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicates::str::contains(format!("Error making request: GET {}", url)))
        .stderr(predicates::str::contains(
            "giving up after 2 attempt(s): retrying as request generated error:",
        ))
        .stderr(predicates::str::contains("Connection refused"));
}

#[test]
fn test_fetch_empty_url_is_config_error() {
    Command::new(cargo::cargo_bin!("httpdata"))
        .arg("fetch")
        .arg("")
        .assert()
        .failure()
        .stderr(predicates::str::contains("Invalid configuration"));
}

#[test]
fn test_fetch_legacy_shape() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("upgrade")
        .create();

    let output = Command::new(cargo::cargo_bin!("httpdata"))
        .arg("fetch")
        .arg(server.url())
        .arg("--legacy")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let state = stdout_json(&output);
    assert_eq!(state["response_body"], "upgrade");
    assert_eq!(state["response_body_base64_std"], "dXBncmFkZQ==");
    assert!(state.get("request_timeout").is_none());
}

#[test]
fn test_read_many_sources_isolates_failures() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/flag")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("true")
        .create();

    let dir = tempdir().unwrap();
    let file = dir.path().join("sources.json");
    std::fs::write(
        &file,
        serde_json::json!({
            "flag": { "url": format!("{}/flag", server.url()) },
            "down": { "url": closed_port_url(), "retry": { "attempts": 0 } },
            "bad": { "url": "", "request_timeout": 10 }
        })
        .to_string(),
    )
    .unwrap();

    let output = Command::new(cargo::cargo_bin!("httpdata"))
        .arg("read")
        .arg(&file)
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let results = stdout_json(&output);
    assert_eq!(results["flag"]["state"]["response_body"], "true");
    assert_eq!(results["down"]["error"]["kind"], "request");
    assert_eq!(results["bad"]["error"]["kind"], "config");
}

#[test]
fn test_read_malformed_entry_does_not_block_siblings() {
    let mut server = Server::new();
    let flag = server
        .mock("GET", "/flag")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("on")
        .expect(1)
        .create();

    let dir = tempdir().unwrap();
    let file = dir.path().join("sources.json");
    std::fs::write(
        &file,
        serde_json::json!({
            "flag": { "url": format!("{}/flag", server.url()) },
            "bad": { "url": "http://x", "request_timeout": "soon" },
            "unknown": { "url": "http://x", "method": "POST" }
        })
        .to_string(),
    )
    .unwrap();

    let output = Command::new(cargo::cargo_bin!("httpdata"))
        .arg("read")
        .arg(&file)
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    flag.assert();
    let results = stdout_json(&output);
    assert_eq!(results["flag"]["state"]["response_body"], "on");
    assert_eq!(results["bad"]["error"]["kind"], "config");
    assert_eq!(results["unknown"]["error"]["kind"], "config");
}

#[test]
fn test_fetch_rejects_headers_differing_only_in_case() {
    Command::new(cargo::cargo_bin!("httpdata"))
        .arg("fetch")
        .arg("http://127.0.0.1:9/")
        .arg("-H")
        .arg("Accept=application/json")
        .arg("-H")
        .arg("accept=text/plain")
        .assert()
        .failure()
        .stderr(predicates::str::contains("Invalid configuration"))
        .stderr(predicates::str::contains("case-insensitive"));
}

#[test]
fn test_upgrade_from_version_0() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("state.json");
    std::fs::write(
        &file,
        r#"{
            "id": "http://example.com/",
            "url": "http://example.com/",
            "request_headers": null,
            "response_headers": {"Content-Type": "text/plain", "X-Double": "1, 2"},
            "response_body": "upgrade",
            "response_body_base64_std": "dXBncmFkZQ==",
            "status_code": 200
        }"#,
    )
    .unwrap();

    let output = Command::new(cargo::cargo_bin!("httpdata"))
        .arg("upgrade")
        .arg(&file)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let state = stdout_json(&output);
    assert_eq!(state["response_body"], "upgrade");
    assert_eq!(state["response_headers"]["X-Double"], "1, 2");
    assert_eq!(state["status_code"], 200);
    assert!(state["retry"].is_null());
    assert!(state.get("response_body_base64_std").is_none());
}
