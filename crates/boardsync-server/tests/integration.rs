//! End-to-end tests against a real server on an ephemeral port.

use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use boardsync_server::{start, ServerConfig, ServerHandle};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);

fn test_config(dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        data_dir: dir.join("data"),
        static_dir: dir.join("public"),
        landing_page: "board.html".into(),
        shutdown_timeout_secs: 2,
        ..Default::default()
    }
}

async fn boot(dir: &Path) -> (String, ServerHandle) {
    let handle = start(test_config(dir)).await.unwrap();
    (format!("http://{}", handle.addr()), handle)
}

/// Minimal SSE reader over a streaming response body.
struct EventStream {
    body: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buf: Vec<u8>,
}

impl EventStream {
    async fn connect(base: &str) -> Self {
        let resp = reqwest::get(format!("{base}/events")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_owned();
        assert!(content_type.starts_with("text/event-stream"));
        Self {
            body: Box::pin(resp.bytes_stream()),
            buf: Vec::new(),
        }
    }

    /// Next `data:` payload, skipping keep-alive comments.
    async fn next_event(&mut self) -> Option<Value> {
        loop {
            if let Some(pos) = self.buf.windows(2).position(|w| w == b"\n\n") {
                let block: Vec<u8> = self.buf.drain(..pos + 2).collect();
                let block = String::from_utf8(block).unwrap();
                let data: Vec<&str> = block
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(str::trim_start)
                    .collect();
                if data.is_empty() {
                    continue;
                }
                return Some(serde_json::from_str(&data.join("\n")).unwrap());
            }

            match timeout(TIMEOUT, self.body.next()).await.expect("timed out waiting for event") {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(_)) | None => return None,
            }
        }
    }
}

async fn post_patch(base: &str, body: String) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/patch"))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap()
}

async fn get_json(url: String) -> Value {
    reqwest::get(url).await.unwrap().json().await.unwrap()
}

#[tokio::test]
async fn hello_then_patch_reaches_every_subscriber() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = boot(dir.path()).await;

    let mut a = EventStream::connect(&base).await;
    let mut b = EventStream::connect(&base).await;
    assert_eq!(a.next_event().await.unwrap(), json!({"type": "hello", "state": null}));
    assert_eq!(b.next_event().await.unwrap(), json!({"type": "hello", "state": null}));

    let resp = post_patch(&base, json!({"state": {"portals": [{"id": 1}]}}).to_string()).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"ok": true}));

    let expected = json!({"type": "patch", "state": {"portals": [{"id": 1}]}});
    assert_eq!(a.next_event().await.unwrap(), expected);
    assert_eq!(b.next_event().await.unwrap(), expected);

    let state = get_json(format!("{base}/state")).await;
    assert_eq!(state, json!({"state": {"portals": [{"id": 1}]}}));

    handle.shutdown().await;
}

#[tokio::test]
async fn late_joiner_receives_latest_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = boot(dir.path()).await;

    for i in 0..3 {
        let resp = post_patch(&base, json!({"state": {"n": i}}).to_string()).await;
        assert_eq!(resp.status(), 200);
    }

    let mut late = EventStream::connect(&base).await;
    assert_eq!(late.next_event().await.unwrap(), json!({"type": "hello", "state": {"n": 2}}));

    handle.shutdown().await;
}

#[tokio::test]
async fn malformed_updates_are_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = boot(dir.path()).await;

    post_patch(&base, json!({"state": "original"}).to_string()).await;
    let mut sub = EventStream::connect(&base).await;
    assert_eq!(sub.next_event().await.unwrap()["state"], "original");

    for bad in ["{not json", r#"{"board": 1}"#, r#"{"state": null}"#, ""] {
        let resp = post_patch(&base, bad.to_owned()).await;
        assert_eq!(resp.status(), 400, "body {bad:?} should be rejected");
    }

    let state = get_json(format!("{base}/state")).await;
    assert_eq!(state["state"], "original");

    // The next frame the subscriber sees is the next valid update.
    post_patch(&base, json!({"state": "next"}).to_string()).await;
    assert_eq!(sub.next_event().await.unwrap(), json!({"type": "patch", "state": "next"}));

    let health = get_json(format!("{base}/health")).await;
    assert_eq!(health["stats"]["updates_rejected"], 4);
    assert_eq!(health["stats"]["updates_applied"], 2);

    handle.shutdown().await;
}

#[tokio::test]
async fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = boot(dir.path()).await;
    post_patch(&base, json!({"state": {"saved": true}}).to_string()).await;
    handle.shutdown().await;

    let persisted = std::fs::read_to_string(dir.path().join("data").join("boards.json")).unwrap();
    assert_eq!(serde_json::from_str::<Value>(&persisted).unwrap(), json!({"saved": true}));

    let (base, handle) = boot(dir.path()).await;
    let state = get_json(format!("{base}/state")).await;
    assert_eq!(state, json!({"state": {"saved": true}}));

    let mut sub = EventStream::connect(&base).await;
    assert_eq!(sub.next_event().await.unwrap(), json!({"type": "hello", "state": {"saved": true}}));

    handle.shutdown().await;
}

#[tokio::test]
async fn corrupt_state_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data").join("boards.json"), "{\"truncated\": ").unwrap();

    let (base, handle) = boot(dir.path()).await;
    assert_eq!(get_json(format!("{base}/state")).await, json!({"state": null}));

    let mut sub = EventStream::connect(&base).await;
    assert_eq!(sub.next_event().await.unwrap(), json!({"type": "hello", "state": null}));

    handle.shutdown().await;
}

#[tokio::test]
async fn serves_landing_page_and_static_assets() {
    let dir = tempfile::tempdir().unwrap();
    let public = dir.path().join("public");
    std::fs::create_dir_all(&public).unwrap();
    std::fs::write(public.join("board.html"), "<html>board</html>").unwrap();
    std::fs::write(public.join("app.js"), "console.log(1);").unwrap();

    let (base, handle) = boot(dir.path()).await;

    let landing = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(landing.status(), 200);
    assert!(landing.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    assert_eq!(landing.text().await.unwrap(), "<html>board</html>");

    let script = reqwest::get(format!("{base}/app.js")).await.unwrap();
    assert_eq!(script.status(), 200);
    assert!(script.headers()["content-type"].to_str().unwrap().contains("javascript"));

    let missing = reqwest::get(format!("{base}/nope.css")).await.unwrap();
    assert_eq!(missing.status(), 404);

    handle.shutdown().await;
}

#[tokio::test]
async fn relay_endpoints_allow_any_origin() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = boot(dir.path()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/state"))
        .header("origin", "https://elsewhere.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("{base}/patch"))
        .header("origin", "https://elsewhere.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(preflight.status().is_success());
    assert_eq!(preflight.headers()["access-control-allow-origin"], "*");

    handle.shutdown().await;
}

#[tokio::test]
async fn disconnected_subscriber_leaves_registry() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = boot(dir.path()).await;

    let mut sub = EventStream::connect(&base).await;
    sub.next_event().await.unwrap();
    assert_eq!(handle.relay().registry().count(), 1);
    drop(sub);

    // The server notices the dead connection on its next write.
    let mut remaining = 1;
    for i in 0..50 {
        post_patch(&base, json!({"state": {"tick": i}}).to_string()).await;
        remaining = handle.relay().registry().count();
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_ends_open_streams() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = boot(dir.path()).await;

    let mut sub = EventStream::connect(&base).await;
    sub.next_event().await.unwrap();

    handle.shutdown().await;
    assert!(sub.next_event().await.is_none());
}

#[tokio::test]
async fn closed_relay_refuses_new_streams() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = boot(dir.path()).await;

    handle.relay().close_all();
    let resp = timeout(TIMEOUT, reqwest::get(format!("{base}/events")))
        .await
        .expect("refusal should be immediate")
        .unwrap();
    assert_eq!(resp.status(), 503);
    assert_eq!(handle.relay().registry().count(), 0);

    handle.shutdown().await;
}
