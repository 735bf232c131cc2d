//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use h1_guard::config::ServerConfig;
use h1_guard::http::HttpServer;
use h1_guard::lifecycle::Shutdown;
use h1_guard::net::{Listener, ListenerError};

/// A server running on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    updates: mpsc::UnboundedSender<ServerConfig>,
    task: JoinHandle<Result<(), ListenerError>>,
}

impl TestServer {
    /// Push a configuration as if the watcher had reloaded it.
    #[allow(dead_code)]
    pub fn reload(&self, config: ServerConfig) {
        self.updates.send(config).unwrap();
    }

    /// Trigger shutdown and wait for the accept loop to return.
    #[allow(dead_code)]
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

/// Start a server with the default handler, bound to `127.0.0.1:0`.
pub async fn start_server(mut config: ServerConfig) -> TestServer {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::with_default_handler(config);
    let server_shutdown = shutdown.subscribe();

    let task = tokio::spawn(async move { server.run(listener, config_updates, server_shutdown).await });

    TestServer {
        addr,
        shutdown,
        updates,
        task,
    }
}

/// `count` header lines of the form `Header-{i}: value{i}\r\n`.
#[allow(dead_code)]
pub fn make_headers(count: usize) -> String {
    (0..count)
        .map(|i| format!("Header-{i}: value{i}\r\n"))
        .collect()
}

#[allow(dead_code)]
pub fn get_request(headers: &str) -> Vec<u8> {
    format!("GET / HTTP/1.1\r\n{headers}\r\n").into_bytes()
}

/// Send `request` in `chunk`-sized writes, half-close, and read until the
/// server closes.
///
/// Write errors are tolerated: the server may answer and close before the
/// whole request is sent.
pub async fn send_chunked(addr: SocketAddr, request: &[u8], chunk: usize) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.set_nodelay(true).unwrap();
    for piece in request.chunks(chunk.max(1)) {
        if stream.write_all(piece).await.is_err() {
            break;
        }
        if chunk < request.len() {
            let _ = stream.flush().await;
            tokio::task::yield_now().await;
        }
    }
    let _ = stream.shutdown().await;
    read_until_close(&mut stream).await
}

/// Send all of `request` in one write.
#[allow(dead_code)]
pub async fn send_all(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    send_chunked(addr, request, request.len()).await
}

/// Read whatever arrives until EOF, a reset, or a 10 second ceiling.
pub async fn read_until_close(stream: &mut TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        match tokio::time::timeout_at(deadline, stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
            Ok(Ok(n)) => received.extend_from_slice(&buf[..n]),
        }
    }
    received
}

/// Assert `response` is exactly the bodyless error response for `status_line`.
#[allow(dead_code)]
pub fn assert_rejection(response: &[u8], status_line: &str) {
    let text = String::from_utf8_lossy(response);
    let lines: Vec<&str> = text.split("\r\n").collect();
    assert_eq!(lines.len(), 6, "unexpected response: {text:?}");
    assert_eq!(lines[0], status_line);
    assert_eq!(lines[1], "Connection: close");
    let date = lines[2]
        .strip_prefix("Date: ")
        .unwrap_or_else(|| panic!("missing Date header: {text:?}"));
    assert!(httpdate::parse_http_date(date).is_ok(), "bad date {date:?}");
    assert_eq!(lines[3], "Content-Length: 0");
    assert_eq!(lines[4], "");
    assert_eq!(lines[5], "");
}

#[allow(dead_code)]
pub fn assert_431(response: &[u8]) {
    assert_rejection(response, "HTTP/1.1 431 Request Header Fields Too Large");
}

/// Assert `response` is a single `200 OK` carrying `hello, world`.
#[allow(dead_code)]
pub fn assert_hello_world(response: &[u8]) {
    let text = String::from_utf8_lossy(response);
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "unexpected response: {text:?}");
    assert!(text.contains("\r\nContent-Length: 12\r\n"));
    assert!(text.ends_with("\r\n\r\nhello, world"), "unexpected response: {text:?}");
    assert_eq!(text.matches("HTTP/1.1 ").count(), 1);
}
