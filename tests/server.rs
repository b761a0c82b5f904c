//! End-to-end tests driving the server over real TCP connections.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use warden::config::{AppState, Config};
use warden::security::Mutation;
use warden::server;

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: Option<oneshot::Sender<()>>,
    _dir: tempfile::TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

async fn start(enable_security: bool) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("http");
    std::fs::create_dir_all(root.join("css")).unwrap();
    std::fs::write(root.join("index.html"), "<h1>home</h1>").unwrap();
    std::fs::write(root.join("css/site.css"), "body{}").unwrap();
    std::fs::write(root.join("50x.html"), "<p>custom error</p>").unwrap();
    std::fs::write(dir.path().join("secret.txt"), "top secret").unwrap();

    let mut config = Config::default();
    config.files.document_root = root.to_str().unwrap().to_string();
    config.logging.log_file = None;
    config.security.enable_security = enable_security;

    let state = Arc::new(AppState::new(config, dir.path().join("config.toml")).unwrap());
    let listener = server::create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();

    let (tx, rx) = oneshot::channel::<()>();
    let serving = Arc::clone(&state);
    tokio::spawn(async move {
        server::serve(listener, &serving, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });

    TestServer {
        addr,
        state,
        shutdown: Some(tx),
        _dir: dir,
    }
}

async fn send(addr: SocketAddr, method: &str, target: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request =
        format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has a header terminator");
    let head = String::from_utf8(raw[..split].to_vec()).unwrap();
    let body = raw[split + 4..].to_vec();

    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .unwrap();
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    RawResponse {
        status,
        headers,
        body,
    }
}

#[tokio::test]
async fn test_get_index_counts_html_hit() {
    let srv = start(true).await;

    let resp = send(srv.addr, "GET", "/").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"<h1>home</h1>");
    assert_eq!(resp.headers["content-length"], "13");
    assert!(resp.headers["content-type"].starts_with("text/html"));

    let css = send(srv.addr, "GET", "/css/site.css").await;
    assert_eq!(css.status, 200);
    assert!(css.headers["content-type"].starts_with("text/css"));

    assert_eq!(srv.state.access.count("127.0.0.1"), 1);
}

#[tokio::test]
async fn test_head_sends_length_without_body() {
    let srv = start(false).await;

    let resp = send(srv.addr, "HEAD", "/index.html").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.headers["content-length"], "13");
    assert!(resp.body.is_empty());
}

#[tokio::test]
async fn test_blacklist_takes_effect_at_runtime() {
    let srv = start(true).await;
    assert_eq!(send(srv.addr, "GET", "/").await.status, 200);

    srv.state.security.mutate(Mutation::Add, "127.0.0.1");
    let blocked = send(srv.addr, "GET", "/").await;
    assert_eq!(blocked.status, 403);
    assert_eq!(blocked.body, b"<p>custom error</p>");

    srv.state.security.mutate(Mutation::Remove, "127.0.0.1");
    assert_eq!(send(srv.addr, "GET", "/").await.status, 200);

    let saved = Config::load_from(srv.state.config_store.path().to_str().unwrap()).unwrap();
    assert!(saved.security.blacklist.is_empty());
}

#[tokio::test]
async fn test_error_statuses() {
    let srv = start(false).await;

    let post = send(srv.addr, "POST", "/").await;
    assert_eq!(post.status, 405);
    assert_eq!(post.body, b"405 Method Not Allowed");

    let missing = send(srv.addr, "GET", "/nope.html").await;
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body, b"<p>custom error</p>");
    assert_eq!(missing.headers["content-length"], missing.body.len().to_string());

    let traversal = send(srv.addr, "GET", "/..%2fsecret.txt").await;
    assert_eq!(traversal.status, 404);
    assert!(!String::from_utf8_lossy(&traversal.body).contains("top secret"));
}
