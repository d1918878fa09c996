//! MCP transport layer.
//!
//! The Neo4j MCP server speaks the HTTP+SSE transport: the client opens a
//! long-lived `GET` event stream, the server's first event (`endpoint`)
//! names a URL to `POST` JSON-RPC messages to, and every server message
//! (responses included) comes back down the event stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Response, Url};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::protocol::{
    IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND,
};
use crate::sse::{SseDecoder, SseEvent};

/// Trait for MCP server transports.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a JSON-RPC request and wait for the corresponding response.
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError>;

    /// Send a JSON-RPC notification (no response expected).
    async fn send_notification(&self, method: &str) -> Result<(), TransportError>;

    /// Check if the transport is still alive.
    fn is_alive(&self) -> bool;

    /// Shut down the transport.
    async fn shutdown(&self) -> Result<(), TransportError>;
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("event stream closed before the message endpoint was announced")]
    NoEndpoint,

    #[error("event stream closed")]
    Closed,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("event reader task failed: {0}")]
    Reader(String),
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Timeouts for an [`SseTransport`].
#[derive(Debug, Clone, Copy)]
pub struct SseOptions {
    /// Bound on opening the stream and receiving the `endpoint` event.
    pub connect_timeout: Duration,
    /// Bound on each request/response round trip.
    pub request_timeout: Duration,
}

impl Default for SseOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// HTTP+SSE transport.
///
/// A background reader task owns the event stream and routes each response
/// to the caller waiting on its `id`, so requests may be issued concurrently.
pub struct SseTransport {
    http: Client,
    endpoint: Url,
    pending: PendingMap,
    next_id: AtomicU64,
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
    request_timeout: Duration,
}

impl SseTransport {
    /// Open the event stream at `url` and wait for the message endpoint.
    pub async fn connect(url: &str, options: SseOptions) -> Result<Self, TransportError> {
        let stream_url = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let http = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()?;

        let (response, decoder, endpoint) = tokio::time::timeout(
            options.connect_timeout,
            open_stream(&http, &stream_url),
        )
        .await
        .map_err(|_| TransportError::Timeout)??;

        tracing::debug!(endpoint = %endpoint.path(), "MCP message endpoint announced");

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let reader = tokio::spawn(read_events(
            response,
            decoder,
            EventRouter {
                http: http.clone(),
                endpoint: endpoint.clone(),
                pending: pending.clone(),
            },
            alive.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            http,
            endpoint,
            pending,
            next_id: AtomicU64::new(1),
            alive,
            cancel,
            reader: Mutex::new(Some(reader)),
            request_timeout: options.request_timeout,
        })
    }

    /// The URL JSON-RPC messages are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }

        let id = self.next_request_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        // The reader may have exited and cleared the map after the check above.
        if !self.is_alive() {
            self.pending.lock().remove(&id);
            return Err(TransportError::Closed);
        }

        tracing::debug!(id, method, "sending MCP request");
        let req = JsonRpcRequest::new(id, method, params);
        if let Err(e) = post_message(&self.http, &self.endpoint, &req).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            // Sender dropped: the reader task ended and cleared the pending map.
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(TransportError::Timeout)
            }
        }
    }

    async fn send_notification(&self, method: &str) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }
        let notif = JsonRpcNotification::new(method);
        tracing::debug!(method, "sending MCP notification");
        post_message(&self.http, &self.endpoint, &notif).await
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.alive.store(false, Ordering::SeqCst);
        self.cancel.cancel();

        let reader = self.reader.lock().take();
        match reader {
            Some(handle) => handle
                .await
                .map_err(|e| TransportError::Reader(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `GET` the event stream and read until the `endpoint` event arrives.
///
/// Returns the live response and decoder so no buffered bytes are lost.
async fn open_stream(
    http: &Client,
    stream_url: &Url,
) -> Result<(Response, SseDecoder, Url), TransportError> {
    let mut response = http
        .get(stream_url.clone())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(status_error(response).await);
    }

    let mut decoder = SseDecoder::new();
    loop {
        let Some(chunk) = response.chunk().await? else {
            return Err(TransportError::NoEndpoint);
        };
        for event in decoder.push(&chunk) {
            if event.kind() == "endpoint" {
                let endpoint = stream_url
                    .join(event.data.trim())
                    .map_err(|e| TransportError::InvalidUrl(format!("endpoint {}: {e}", event.data)))?;
                return Ok((response, decoder, endpoint));
            }
            tracing::debug!(kind = %event.kind(), "ignoring event received before endpoint");
        }
    }
}

struct EventRouter {
    http: Client,
    endpoint: Url,
    pending: PendingMap,
}

impl EventRouter {
    async fn route(&self, event: SseEvent) {
        if event.kind() != "message" {
            tracing::debug!(kind = %event.kind(), "ignoring non-message event");
            return;
        }

        match IncomingMessage::parse(&event.data) {
            Ok(IncomingMessage::Response(resp)) => {
                let waiter = resp.id.as_u64().and_then(|id| self.pending.lock().remove(&id));
                match waiter {
                    Some(tx) => {
                        // The caller may have timed out and dropped the receiver.
                        let _ = tx.send(resp);
                    }
                    None => tracing::debug!(id = %resp.id, "response for unknown request, dropping"),
                }
            }
            Ok(IncomingMessage::Request(req)) => self.answer(req).await,
            Ok(IncomingMessage::Notification(notif)) => {
                tracing::debug!(method = %notif.method, "MCP server notification");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse MCP message from event stream");
            }
        }
    }

    /// Reply to a server-initiated request. Only `ping` is supported.
    async fn answer(&self, req: JsonRpcRequest) {
        let reply = if req.method == "ping" {
            JsonRpcResponse::success(req.id, serde_json::json!({}))
        } else {
            JsonRpcResponse::failure(req.id, METHOD_NOT_FOUND, format!("unsupported method: {}", req.method))
        };
        if let Err(e) = post_message(&self.http, &self.endpoint, &reply).await {
            tracing::warn!(method = %req.method, error = %e, "failed to answer MCP server request");
        }
    }
}

async fn read_events(
    mut response: Response,
    mut decoder: SseDecoder,
    router: EventRouter,
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("MCP event reader cancelled");
                break;
            }
            chunk = response.chunk() => match chunk {
                Ok(Some(bytes)) => {
                    for event in decoder.push(&bytes) {
                        router.route(event).await;
                    }
                }
                Ok(None) => {
                    for event in decoder.finish() {
                        router.route(event).await;
                    }
                    tracing::debug!("MCP event stream ended");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "MCP event stream failed");
                    break;
                }
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    // Dropping the senders wakes every waiting caller with `Closed`.
    router.pending.lock().clear();
}

async fn post_message<T: Serialize>(http: &Client, endpoint: &Url, message: &T) -> Result<(), TransportError> {
    let resp = http.post(endpoint.clone()).json(message).send().await?;
    if !resp.status().is_success() {
        return Err(status_error(resp).await);
    }
    Ok(())
}

async fn status_error(resp: Response) -> TransportError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    TransportError::Status { status, body }
}
