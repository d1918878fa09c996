//! A connected MCP client: handshake, tool discovery and dispatch over any
//! [`McpTransport`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::McpError;
use crate::protocol::{self, InitializeResult, McpToolDef, ServerInfo, ToolCallResult, ToolsListResult};
use crate::session::McpSession;
use crate::transport::McpTransport;

/// Upper bound on `tools/list` pages, in case a server keeps returning cursors.
const MAX_TOOL_PAGES: usize = 64;

pub struct McpClient {
    transport: Box<dyn McpTransport>,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    /// Perform the MCP handshake over an already-open transport.
    pub async fn initialize(transport: Box<dyn McpTransport>, client_name: &str) -> Result<Self, McpError> {
        // Step 1: Send `initialize` request.
        let params = serde_json::to_value(protocol::initialize_params(client_name))
            .map_err(|e| McpError::Protocol(format!("failed to serialize initialize params: {e}")))?;

        let init: InitializeResult = request(transport.as_ref(), "initialize", Some(params)).await?;

        tracing::debug!(
            protocol_version = %init.protocol_version,
            server = ?init.server_info.as_ref().map(|s| s.name.as_str()),
            "MCP initialize response received"
        );

        // Step 2: Send `notifications/initialized` notification.
        transport.send_notification("notifications/initialized").await?;

        Ok(Self {
            transport,
            server_info: init.server_info,
        })
    }

    /// Server identity reported during the handshake, if any.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// List every tool, following `nextCursor` pagination.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.take().map(|c| serde_json::json!({ "cursor": c }));
            let page: ToolsListResult = request(self.transport.as_ref(), "tools/list", params).await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        tracing::warn!(pages = MAX_TOOL_PAGES, "tools/list pagination limit reached, truncating");
        Ok(tools)
    }

    /// Call a tool by name.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        if !self.transport.is_alive() {
            return Err(McpError::Transport(crate::transport::TransportError::Closed));
        }

        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments
        });
        request(self.transport.as_ref(), "tools/call", Some(params)).await
    }

    /// Shut down the underlying transport.
    pub async fn close(&self) -> Result<(), McpError> {
        self.transport.shutdown().await.map_err(McpError::Transport)
    }
}

#[async_trait]
impl McpSession for McpClient {
    async fn tools(&self) -> Result<HashMap<String, McpToolDef>, McpError> {
        let tools = self.list_tools().await?;
        Ok(tools.into_iter().map(|t| (t.name.clone(), t)).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        McpClient::call_tool(self, name, arguments).await
    }

    async fn close(&self) -> Result<(), McpError> {
        McpClient::close(self).await
    }

    fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }
}

/// Send a request and decode its result payload.
async fn request<T: DeserializeOwned>(
    transport: &dyn McpTransport,
    method: &str,
    params: Option<Value>,
) -> Result<T, McpError> {
    let resp = transport.send_request(method, params).await?;
    let value = resp
        .into_result()
        .map_err(|err| McpError::Protocol(format!("{method} failed: {err}")))?;
    serde_json::from_value(value)
        .map_err(|e| McpError::Protocol(format!("failed to parse {method} result: {e}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
