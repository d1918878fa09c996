use crate::transport::TransportError;

/// Errors specific to MCP operations.
///
/// Wrapping variants keep the underlying failure as their `source`, so the
/// full chain is available to callers that walk `Error::source()`.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Missing base URL or API key. Raised before any network I/O.
    #[error("MCP configuration error: {0}")]
    Configuration(String),

    /// The transport or handshake failed while connecting.
    #[error("failed to connect to MCP server at {url}: {source}")]
    Connection {
        /// Server URL with the API key masked.
        url: String,
        #[source]
        source: Box<McpError>,
    },

    /// No client is held even after an implicit connect.
    #[error("MCP client not initialized")]
    NotInitialized,

    #[error("failed to retrieve MCP tools: {source}")]
    ToolRetrieval {
        #[source]
        source: Box<McpError>,
    },

    #[error("MCP tool `{tool}` failed: {source}")]
    ToolCall {
        tool: String,
        #[source]
        source: Box<McpError>,
    },

    #[error("MCP transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("MCP protocol error: {0}")]
    Protocol(String),
}

impl From<McpError> for gl_domain::error::Error {
    fn from(e: McpError) -> Self {
        match e {
            McpError::Configuration(msg) => gl_domain::error::Error::Config(msg),
            timeout @ McpError::Transport(TransportError::Timeout) => {
                gl_domain::error::Error::Timeout(timeout.to_string())
            }
            other => gl_domain::error::Error::Mcp(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn connection_error_preserves_cause() {
        let err = McpError::Connection {
            url: "https://example.com/****/api/mcp/".into(),
            source: Box::new(McpError::Transport(TransportError::Closed)),
        };
        assert_eq!(
            err.to_string(),
            "failed to connect to MCP server at https://example.com/****/api/mcp/: \
             MCP transport error: event stream closed"
        );
        let cause = err.source().unwrap();
        assert_eq!(cause.to_string(), "MCP transport error: event stream closed");
    }

    #[test]
    fn converts_into_domain_error() {
        let err: gl_domain::error::Error = McpError::Configuration("no base URL".into()).into();
        assert!(matches!(err, gl_domain::error::Error::Config(ref m) if m == "no base URL"));

        let err: gl_domain::error::Error = McpError::Transport(TransportError::Timeout).into();
        assert!(matches!(err, gl_domain::error::Error::Timeout(_)));

        let err: gl_domain::error::Error = McpError::NotInitialized.into();
        assert_eq!(err.to_string(), "MCP: MCP client not initialized");
    }
}
