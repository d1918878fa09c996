//! The seam between the connection lifecycle ([`ClientHandle`]) and the
//! MCP library underneath it.
//!
//! [`ClientHandle`]: crate::handle::ClientHandle

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use gl_domain::config::GraphMcpConfig;

use crate::client::McpClient;
use crate::error::McpError;
use crate::protocol::{McpToolDef, ToolCallResult};
use crate::transport::{SseOptions, SseTransport};

/// A live, initialized connection to an MCP server.
#[async_trait]
pub trait McpSession: Send + Sync {
    /// All tools the server exposes, keyed by tool name.
    async fn tools(&self) -> Result<HashMap<String, McpToolDef>, McpError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError>;

    /// Close the connection. May fail; callers treat this as best-effort.
    async fn close(&self) -> Result<(), McpError>;

    /// Whether the underlying connection is still usable.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Creates sessions bound to a server URL.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self, server_url: &str) -> Result<Arc<dyn McpSession>, McpError>;
}

/// Default factory: HTTP+SSE transport followed by the MCP handshake.
#[derive(Debug, Clone)]
pub struct SseSessionFactory {
    options: SseOptions,
    client_name: String,
}

impl SseSessionFactory {
    pub fn new(options: SseOptions, client_name: impl Into<String>) -> Self {
        Self {
            options,
            client_name: client_name.into(),
        }
    }

    pub fn from_config(config: &GraphMcpConfig) -> Self {
        Self::new(
            SseOptions {
                connect_timeout: Duration::from_millis(config.connect_timeout_ms),
                request_timeout: Duration::from_millis(config.request_timeout_ms),
            },
            config.client_name.clone(),
        )
    }
}

impl Default for SseSessionFactory {
    fn default() -> Self {
        Self::from_config(&GraphMcpConfig::default())
    }
}

#[async_trait]
impl SessionFactory for SseSessionFactory {
    async fn create(&self, server_url: &str) -> Result<Arc<dyn McpSession>, McpError> {
        let transport = SseTransport::connect(server_url, self.options).await?;
        // On handshake failure the transport is dropped, cancelling its reader.
        let client = McpClient::initialize(Box::new(transport), &self.client_name).await?;

        if let Some(info) = client.server_info() {
            tracing::info!(server = %info.name, version = %info.version, "MCP session established");
        }
        Ok(Arc::new(client))
    }
}
