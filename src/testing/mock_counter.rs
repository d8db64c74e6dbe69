//! Mock visitor-counter server for tests
//!
//! Provides a [`MockCounterServer`] that answers
//! `GET /api/visitor/increment?target=<site-id>` the way the real counter
//! does, with a running count per site. Tests point an
//! [`HttpCounterClient`](crate::stats::HttpCounterClient) at [`url`] and
//! never touch the network beyond loopback.
//!
//! # Example
//! ```ignore
//! let server = MockCounterServer::builder()
//!     .with_start_count(41)
//!     .build()
//!     .await?;
//! let client = HttpCounterClient::new(server.url(), Duration::from_secs(1))?;
//! // ... first increment returns 42 ...
//! server.stop().await;
//! ```
//!
//! [`url`]: MockCounterServer::url

use crate::stats::counter::INCREMENT_PATH;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};

/// How the server answers a single increment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCounterResponse {
    /// Increment the site's count and return it.
    Count,
    /// Return an HTTP error with the given status code and body.
    Error { status: u16, body: String },
    /// Return a 200 with a body that is not a counter document.
    Malformed(String),
}

/// Configuration produced by the builder.
#[derive(Debug, Clone, Default)]
pub struct MockCounterConfig {
    /// Queue of responses, served in FIFO order; [`MockCounterResponse::Count`]
    /// once exhausted.
    pub responses: Vec<MockCounterResponse>,
    /// Count every site starts from.
    pub start_count: u64,
    /// Include `pageViews` in successful responses.
    pub page_views: bool,
    /// Artificial latency added before every response (milliseconds).
    pub latency_ms: u64,
}

#[derive(Debug, Default)]
struct ServerState {
    next_response: usize,
    counts: BTreeMap<String, u64>,
    requests: Vec<String>,
}

pub struct MockCounterServer {
    url: String,
    state: Arc<Mutex<ServerState>>,
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockCounterServer {
    pub fn builder() -> MockCounterServerBuilder {
        MockCounterServerBuilder::default()
    }

    /// Bind `127.0.0.1:0` and serve in a background task.
    pub async fn start(config: MockCounterConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = format!("http://{}", addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(Mutex::new(ServerState::default()));
        let handle = tokio::spawn(accept_loop(
            listener,
            Arc::new(config),
            Arc::clone(&state),
            shutdown_rx,
        ));

        Ok(Self {
            url,
            state,
            shutdown_tx,
            handle,
        })
    }

    /// The base URL of this server (e.g. `"http://127.0.0.1:54321"`).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request targets seen so far, in arrival order.
    pub async fn requests(&self) -> Vec<String> {
        self.state.lock().await.requests.clone()
    }

    pub async fn count(&self, site_id: &str) -> Option<u64> {
        self.state.lock().await.counts.get(site_id).copied()
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

#[derive(Default)]
pub struct MockCounterServerBuilder {
    config: MockCounterConfig,
}

impl MockCounterServerBuilder {
    pub fn with_start_count(mut self, count: u64) -> Self {
        self.config.start_count = count;
        self
    }

    pub fn with_page_views(mut self) -> Self {
        self.config.page_views = true;
        self
    }

    pub fn with_error(mut self, status: u16, body: impl Into<String>) -> Self {
        self.config.responses.push(MockCounterResponse::Error {
            status,
            body: body.into(),
        });
        self
    }

    pub fn with_malformed(mut self, body: impl Into<String>) -> Self {
        self.config
            .responses
            .push(MockCounterResponse::Malformed(body.into()));
        self
    }

    pub fn with_latency(mut self, ms: u64) -> Self {
        self.config.latency_ms = ms;
        self
    }

    pub async fn build(self) -> std::io::Result<MockCounterServer> {
        MockCounterServer::start(self.config).await
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: Arc<MockCounterConfig>,
    state: Arc<Mutex<ServerState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        let cfg = Arc::clone(&config);
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, cfg, state).await {
                                tracing::debug!("mock counter connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::debug!("mock counter accept error: {}", e);
                    }
                }
            }
        }
    }
}

/// `target` query parameter of a request line like
/// `GET /api/visitor/increment?target=abc HTTP/1.1`.
fn target_of(request_line: &str) -> Option<String> {
    let path = request_line.split_whitespace().nth(1)?;
    let (route, query) = path.split_once('?')?;
    if route != INCREMENT_PATH {
        return None;
    }
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "target")
        .map(|(_, value)| value.to_string())
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    config: Arc<MockCounterConfig>,
    state: Arc<Mutex<ServerState>>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }
    let request = String::from_utf8_lossy(&buf[..n]);
    let request_line = request.lines().next().unwrap_or_default();

    let target = match target_of(request_line) {
        Some(target) if request_line.starts_with("GET") => target,
        _ => {
            let response = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
            stream.write_all(response.as_bytes()).await?;
            return Ok(());
        }
    };

    if config.latency_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(config.latency_ms)).await;
    }

    let (status, body) = {
        let mut state = state.lock().await;
        state.requests.push(target.clone());
        let response = config
            .responses
            .get(state.next_response)
            .cloned()
            .unwrap_or(MockCounterResponse::Count);
        state.next_response += 1;

        match response {
            MockCounterResponse::Count => {
                let count = state.counts.entry(target).or_insert(config.start_count);
                *count += 1;
                let body = if config.page_views {
                    serde_json::json!({ "count": *count, "pageViews": *count * 3 })
                } else {
                    serde_json::json!({ "count": *count })
                };
                (200, body.to_string())
            }
            MockCounterResponse::Error { status, body } => (status, body),
            MockCounterResponse::Malformed(body) => (200, body),
        }
    };

    write_http_response(&mut stream, status, &body).await
}

async fn write_http_response(
    stream: &mut tokio::net::TcpStream,
    status: u16,
    body: &str,
) -> std::io::Result<()> {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body,
    );

    stream.write_all(response.as_bytes()).await
}
