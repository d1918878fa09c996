//! `ClientHandle`: connection lifecycle for one Neo4j MCP server.
//!
//! The handle owns the derived server URL and at most one live session.
//! State is `disconnected` or `connected`; the transition is guarded by an
//! async mutex held across the connect, so concurrent callers share a
//! single in-flight connection attempt.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use gl_domain::config::{self, GraphMcpConfig};

use crate::error::McpError;
use crate::protocol::{McpToolDef, ToolCallResult};
use crate::session::{McpSession, SessionFactory, SseSessionFactory};

/// Receives errors that the handle swallows (currently: disconnect failures).
pub type ErrorSink = Arc<dyn Fn(&McpError) + Send + Sync>;

pub struct ClientHandle {
    api_key: String,
    server_url: String,
    factory: Arc<dyn SessionFactory>,
    client: Mutex<Option<Arc<dyn McpSession>>>,
    /// Mirrors `client.is_some()`; only written while `client` is locked.
    connected: AtomicBool,
    on_disconnect_error: Option<ErrorSink>,
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("server_url", &self.redacted_url())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl ClientHandle {
    /// Build a handle using the SSE session factory configured by `config`.
    ///
    /// The base URL comes from `config.base_url`, falling back to the
    /// `NEO4J_MCP_URL` environment variable (or `config.url_env`).
    pub fn new(api_key: impl Into<String>, config: &GraphMcpConfig) -> Result<Self, McpError> {
        Self::with_factory(
            api_key,
            config.resolve_base_url(),
            Arc::new(SseSessionFactory::from_config(config)),
        )
    }

    /// Build a handle from an already-resolved base URL and a custom factory.
    ///
    /// Performs no I/O.
    pub fn with_factory(
        api_key: impl Into<String>,
        base_url: Option<String>,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<Self, McpError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(McpError::Configuration("API key must not be empty".into()));
        }

        let base_url = base_url.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
            McpError::Configuration(format!(
                "no MCP server base URL; set {} or pass a base URL",
                config::DEFAULT_URL_ENV
            ))
        })?;

        let server_url = config::build_server_url(&base_url, &api_key);

        Ok(Self {
            api_key,
            server_url,
            factory,
            client: Mutex::new(None),
            connected: AtomicBool::new(false),
            on_disconnect_error: None,
        })
    }

    /// Report swallowed disconnect failures to `sink` as well as the log.
    pub fn on_disconnect_error(mut self, sink: ErrorSink) -> Self {
        self.on_disconnect_error = Some(sink);
        self
    }

    /// The full server URL, API key included.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// The server URL with the API key masked, safe for logs.
    pub fn redacted_url(&self) -> String {
        config::redact_api_key(&self.server_url, &self.api_key)
    }

    /// Connected flag, cleared early when the held session's transport has died.
    pub fn is_connected(&self) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        match self.client.try_lock() {
            Ok(client) => client.as_ref().is_some_and(|session| session.is_alive()),
            // A connect or disconnect is in flight; the flag is authoritative.
            Err(_) => true,
        }
    }

    /// The raw session, if connected.
    pub async fn client(&self) -> Option<Arc<dyn McpSession>> {
        self.client.lock().await.clone()
    }

    /// Connect if not already connected.
    pub async fn connect(&self) -> Result<(), McpError> {
        let mut client = self.client.lock().await;

        if let Some(existing) = client.as_ref() {
            if existing.is_alive() {
                tracing::debug!(server_url = %self.redacted_url(), "MCP client already connected");
                return Ok(());
            }
            tracing::info!(server_url = %self.redacted_url(), "MCP session no longer alive, reconnecting");
            self.connected.store(false, Ordering::SeqCst);
            *client = None;
        }

        tracing::info!(server_url = %self.redacted_url(), "connecting to MCP server");

        match self.factory.create(&self.server_url).await {
            Ok(session) => {
                *client = Some(session);
                self.connected.store(true, Ordering::SeqCst);
                tracing::info!(server_url = %self.redacted_url(), "connected to MCP server");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    server_url = %self.redacted_url(),
                    error = %e,
                    "failed to connect to MCP server"
                );
                Err(McpError::Connection {
                    url: self.redacted_url(),
                    source: Box::new(e),
                })
            }
        }
    }

    /// Close the session, if any. Never fails: close errors are logged and
    /// handed to the error sink, and local state is cleared regardless.
    pub async fn disconnect(&self) {
        let mut client = self.client.lock().await;
        let Some(session) = client.take() else {
            return;
        };
        self.connected.store(false, Ordering::SeqCst);

        match session.close().await {
            Ok(()) => {
                tracing::info!(server_url = %self.redacted_url(), "disconnected from MCP server");
            }
            Err(e) => {
                tracing::warn!(
                    server_url = %self.redacted_url(),
                    error = %e,
                    "error while closing MCP client"
                );
                if let Some(sink) = &self.on_disconnect_error {
                    sink(&e);
                }
            }
        }
    }

    /// Tools exposed by the server, keyed by name. Connects on demand.
    pub async fn tools(&self) -> Result<HashMap<String, McpToolDef>, McpError> {
        let session = self.live_session().await?;
        let tools = session
            .tools()
            .await
            .map_err(|e| McpError::ToolRetrieval { source: Box::new(e) })?;

        tracing::debug!(tool_count = tools.len(), "retrieved MCP tools");
        Ok(tools)
    }

    /// Invoke a tool by name. Connects on demand.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let session = self.live_session().await?;
        session
            .call_tool(name, arguments)
            .await
            .map_err(|e| McpError::ToolCall {
                tool: name.to_string(),
                source: Box::new(e),
            })
    }

    /// The held session, connecting first when there is none or it has died.
    async fn live_session(&self) -> Result<Arc<dyn McpSession>, McpError> {
        let alive = match self.client().await {
            Some(session) => session.is_alive(),
            None => false,
        };
        if !alive || !self.connected.load(Ordering::SeqCst) {
            self.connect().await?;
        }
        self.client().await.ok_or(McpError::NotInitialized)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    pub(crate) struct Counters {
        pub creates: AtomicUsize,
        pub tool_calls: AtomicUsize,
        pub closes: AtomicUsize,
    }

    pub(crate) struct MockSession {
        counters: Arc<Counters>,
        fail_tools: bool,
        fail_close: bool,
        alive: bool,
    }

    #[async_trait]
    impl McpSession for MockSession {
        async fn tools(&self) -> Result<HashMap<String, McpToolDef>, McpError> {
            self.counters.tool_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_tools {
                return Err(McpError::Protocol("tools/list failed: boom".into()));
            }
            let tool = McpToolDef {
                name: "get-neo4j-schema".into(),
                description: "List labels and relationship types".into(),
                input_schema: serde_json::json!({ "type": "object" }),
            };
            Ok(HashMap::from([(tool.name.clone(), tool)]))
        }

        async fn call_tool(&self, name: &str, _arguments: Value) -> Result<ToolCallResult, McpError> {
            serde_json::from_value(serde_json::json!({
                "content": [{ "type": "text", "text": format!("called {name}") }]
            }))
            .map_err(|e| McpError::Protocol(e.to_string()))
        }

        async fn close(&self) -> Result<(), McpError> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(McpError::Transport(TransportError::Closed));
            }
            Ok(())
        }

        fn is_alive(&self) -> bool {
            self.alive
        }
    }

    #[derive(Default)]
    pub(crate) struct MockFactory {
        pub counters: Arc<Counters>,
        pub fail_connect: AtomicBool,
        /// Sessions created while set report a dead transport.
        pub dead_sessions: AtomicBool,
        pub fail_tools: bool,
        pub fail_close: bool,
    }

    #[async_trait]
    impl SessionFactory for MockFactory {
        async fn create(&self, _server_url: &str) -> Result<Arc<dyn McpSession>, McpError> {
            self.counters.creates.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent connect attempts can interleave.
            tokio::task::yield_now().await;
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(McpError::Transport(TransportError::Status {
                    status: 401,
                    body: "unauthorized".into(),
                }));
            }
            Ok(Arc::new(MockSession {
                counters: self.counters.clone(),
                fail_tools: self.fail_tools,
                fail_close: self.fail_close,
                alive: !self.dead_sessions.load(Ordering::SeqCst),
            }))
        }
    }

    fn handle_with(factory: MockFactory) -> (ClientHandle, Arc<Counters>) {
        let counters = factory.counters.clone();
        let handle = ClientHandle::with_factory(
            "abc123",
            Some("https://example.com".into()),
            Arc::new(factory),
        )
        .unwrap();
        (handle, counters)
    }

    #[test]
    fn server_url_is_derived_from_base_and_key() {
        let (handle, _) = handle_with(MockFactory::default());
        assert_eq!(handle.server_url(), "https://example.com/abc123/api/mcp/");
        assert!(!handle.is_connected());
    }

    #[test]
    fn missing_base_url_is_configuration_error() {
        let err = ClientHandle::with_factory("abc123", None, Arc::new(MockFactory::default())).unwrap_err();
        assert!(matches!(err, McpError::Configuration(ref m) if m.contains("NEO4J_MCP_URL")));

        let err = ClientHandle::with_factory("abc123", Some(" ".into()), Arc::new(MockFactory::default()))
            .unwrap_err();
        assert!(matches!(err, McpError::Configuration(_)));
    }

    #[test]
    fn empty_api_key_is_configuration_error() {
        let err = ClientHandle::with_factory("", Some("https://example.com".into()), Arc::new(MockFactory::default()))
            .unwrap_err();
        assert!(matches!(err, McpError::Configuration(_)));
    }

    #[test]
    fn debug_output_masks_api_key() {
        let handle = ClientHandle::with_factory(
            "sk-0123456789abcdef",
            Some("https://example.com".into()),
            Arc::new(MockFactory::default()),
        )
        .unwrap();
        let dbg = format!("{handle:?}");
        assert!(!dbg.contains("sk-0123456789abcdef"));
        assert!(dbg.contains("sk-0...cdef"));
    }

    #[tokio::test]
    async fn second_connect_is_noop() {
        let (handle, counters) = handle_with(MockFactory::default());
        handle.connect().await.unwrap();
        handle.connect().await.unwrap();
        assert_eq!(counters.creates.load(Ordering::SeqCst), 1);
        assert!(handle.is_connected());
        assert!(handle.client().await.is_some());
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_attempt() {
        let (handle, counters) = handle_with(MockFactory::default());
        let (a, b) = tokio::join!(handle.connect(), handle.connect());
        a.unwrap();
        b.unwrap();
        assert_eq!(counters.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_connect_leaves_state_disconnected() {
        let factory = MockFactory::default();
        factory.fail_connect.store(true, Ordering::SeqCst);
        let (handle, _) = handle_with(factory);

        let err = handle.connect().await.unwrap_err();
        match &err {
            McpError::Connection { url, source } => {
                assert_eq!(url, "https://example.com/****/api/mcp/");
                assert!(source.to_string().contains("401"));
            }
            other => panic!("expected Connection error, got {other:?}"),
        }
        assert!(!handle.is_connected());
        assert!(handle.client().await.is_none());
    }

    #[tokio::test]
    async fn tools_connects_lazily_once() {
        let (handle, counters) = handle_with(MockFactory::default());
        let tools = handle.tools().await.unwrap();

        assert!(tools.contains_key("get-neo4j-schema"));
        assert_eq!(counters.creates.load(Ordering::SeqCst), 1);
        assert_eq!(counters.tool_calls.load(Ordering::SeqCst), 1);
        assert!(handle.is_connected());

        handle.tools().await.unwrap();
        assert_eq!(counters.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dead_session_is_replaced_on_next_call() {
        let factory = Arc::new(MockFactory::default());
        factory.dead_sessions.store(true, Ordering::SeqCst);
        let handle = ClientHandle::with_factory(
            "abc123",
            Some("https://example.com".into()),
            factory.clone(),
        )
        .unwrap();

        handle.connect().await.unwrap();
        assert_eq!(factory.counters.creates.load(Ordering::SeqCst), 1);
        assert!(!handle.is_connected());

        factory.dead_sessions.store(false, Ordering::SeqCst);
        let tools = handle.tools().await.unwrap();
        assert!(tools.contains_key("get-neo4j-schema"));
        assert_eq!(factory.counters.creates.load(Ordering::SeqCst), 2);
        assert!(handle.is_connected());

        let result = handle.call_tool("get-neo4j-schema", Value::Null).await.unwrap();
        assert_eq!(result.text(), "called get-neo4j-schema");
        assert_eq!(factory.counters.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tools_propagates_connection_error() {
        let factory = MockFactory::default();
        factory.fail_connect.store(true, Ordering::SeqCst);
        let (handle, counters) = handle_with(factory);

        let err = handle.tools().await.unwrap_err();
        assert!(matches!(err, McpError::Connection { .. }));
        assert_eq!(counters.tool_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tool_listing_failure_is_wrapped() {
        let (handle, _) = handle_with(MockFactory {
            fail_tools: true,
            ..Default::default()
        });
        let err = handle.tools().await.unwrap_err();
        match err {
            McpError::ToolRetrieval { source } => assert!(source.to_string().contains("boom")),
            other => panic!("expected ToolRetrieval, got {other:?}"),
        }
        // The session itself is still held.
        assert!(handle.is_connected());
    }

    #[tokio::test]
    async fn disconnect_without_client_is_noop() {
        let (handle, counters) = handle_with(MockFactory::default());
        handle.disconnect().await;
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn disconnect_then_tools_reconnects() {
        let (handle, counters) = handle_with(MockFactory::default());
        handle.connect().await.unwrap();
        handle.disconnect().await;

        assert!(!handle.is_connected());
        assert!(handle.client().await.is_none());
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);

        handle.tools().await.unwrap();
        assert_eq!(counters.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disconnect_swallows_close_errors_and_reports_them() {
        let reported = Arc::new(AtomicUsize::new(0));
        let seen = reported.clone();
        let (handle, counters) = handle_with(MockFactory {
            fail_close: true,
            ..Default::default()
        });
        let handle = handle.on_disconnect_error(Arc::new(move |e: &McpError| {
            assert!(matches!(e, McpError::Transport(TransportError::Closed)));
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        handle.connect().await.unwrap();
        handle.disconnect().await;

        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
        assert!(!handle.is_connected());
        assert!(handle.client().await.is_none());
    }

    #[tokio::test]
    async fn call_tool_connects_and_delegates() {
        let (handle, counters) = handle_with(MockFactory::default());
        let result = handle
            .call_tool("read-neo4j-cypher", serde_json::json!({ "query": "RETURN 1" }))
            .await
            .unwrap();
        assert_eq!(result.text(), "called read-neo4j-cypher");
        assert_eq!(counters.creates.load(Ordering::SeqCst), 1);
    }
}
