use std::process::Command;
use std::thread;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tiny_http::{Header, Response, Server};

#[test]
fn prints_version() {
    let exe = env!("CARGO_BIN_EXE_ninegag-feed");
    let output = Command::new(exe)
        .arg("--version")
        .output()
        .expect("run ninegag-feed --version");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "stdout was: {}",
        stdout.trim()
    );
}

#[test]
fn prints_help() {
    let exe = env!("CARGO_BIN_EXE_ninegag-feed");
    let output = Command::new(exe)
        .arg("--help")
        .output()
        .expect("run ninegag-feed --help");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(stdout.contains("ninegag-feed"));
    assert!(stdout.contains("--dump"));
}

#[test]
fn rejects_bad_arguments() {
    Command::cargo_bin("ninegag-feed")
        .unwrap()
        .args(["--dump", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("page count"));

    Command::cargo_bin("ninegag-feed")
        .unwrap()
        .arg("--frobnicate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown argument"));
}

const SHORT_PAGE: &str = r#"{
    "status": "ok",
    "items": [
        {"id": "aYb6Ld1", "title": "first", "upVote": "12", "downVote": 3, "creationTs": 1571500000},
        {"id": "bQ9x2Kp", "title": "second"}
    ],
    "stats": {"item_scraped_count": 2}
}"#;

#[test]
fn dumps_pages_from_upstream() {
    let server = Server::http("127.0.0.1:0").expect("bind upstream");
    let addr = server.server_addr().to_string();
    thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = Response::from_string(SHORT_PAGE).with_header(
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
            );
            let _ = request.respond(response);
        }
    });

    Command::cargo_bin("ninegag-feed")
        .unwrap()
        .env("NINEGAG_FEED__BASE_URL", format!("http://{addr}/crawl.json?spider_name=ninegag"))
        .env("RUST_LOG", "off")
        .args(["--dump", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# page 1 (2 items"))
        .stdout(predicate::str::contains("aYb6Ld1\t+12/-3\tfirst"))
        .stdout(predicate::str::contains("# page 2").not());
}

#[test]
fn dump_reports_upstream_failure() {
    let server = Server::http("127.0.0.1:0").expect("bind upstream");
    let addr = server.server_addr().to_string();
    thread::spawn(move || {
        for request in server.incoming_requests() {
            let _ = request.respond(Response::from_string("busy").with_status_code(503));
        }
    });

    Command::cargo_bin("ninegag-feed")
        .unwrap()
        .env("NINEGAG_FEED__BASE_URL", format!("http://{addr}/crawl.json"))
        .env("RUST_LOG", "off")
        .args(["--dump", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("upstream returned status 503"));
}
