//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use rdap_client::config::{BackoffStrategy, ClientConfig};

/// What the mock saw.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub path: String,
    pub accept: Option<String>,
    /// Address the mock is listening on, for self-referencing URLs.
    pub local_addr: SocketAddr,
}

/// What the mock sends back.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/rdap+json".into())],
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self::text(302, "").with_header("Location", location)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Start a programmable mock upstream on an ephemeral port.
pub async fn start_mock<F>(handler: F) -> SocketAddr
where
    F: Fn(&MockRequest) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let Some(head) = read_head(&mut socket).await else {
                            return;
                        };
                        let request = parse_head(&head, local_addr);
                        let reply = handler(&request);
                        if !reply.delay.is_zero() {
                            tokio::time::sleep(reply.delay).await;
                        }

                        let mut response = format!(
                            "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\nConnection: close\r\n",
                            reply.status,
                            reply.body.len()
                        );
                        for (name, value) in &reply.headers {
                            response.push_str(&format!("{name}: {value}\r\n"));
                        }
                        response.push_str("\r\n");
                        response.push_str(&reply.body);

                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    local_addr
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8(buf).ok()
}

fn parse_head(head: &str, local_addr: SocketAddr) -> MockRequest {
    let mut lines = head.lines();
    let path = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let accept = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("accept"))
        .map(|(_, value)| value.trim().to_string());
    MockRequest {
        path,
        accept,
        local_addr,
    }
}

/// Fast-failing config for tests against a local mock.
pub fn test_config(bootstrap_base: &str) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.timeouts.request_ms = 1000;
    config.retries.strategy = BackoffStrategy::Fixed;
    config.retries.initial_delay_ms = 10;
    config.retries.max_delay_ms = 50;
    config.circuit_breaker.threshold = 100;
    config.bootstrap.base_url = bootstrap_base.to_string();
    config
}

/// A bootstrap document with one service entry.
pub fn bootstrap_doc(patterns: &[&str], url: &str) -> serde_json::Value {
    serde_json::json!({
        "version": "1.0",
        "publication": "2024-01-01T00:00:00Z",
        "services": [[patterns, [url]]]
    })
}
