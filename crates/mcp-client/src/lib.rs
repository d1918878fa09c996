//! `gl-mcp-client`: MCP (Model Context Protocol) client for a Neo4j
//! knowledge-graph server.
//!
//! This crate provides:
//! - JSON-RPC 2.0 / MCP protocol types.
//! - An HTTP+SSE transport with an incremental event-stream decoder.
//! - [`McpClient`], which performs the MCP handshake and lists/calls tools.
//! - [`ClientHandle`], the connect/disconnect lifecycle around one session.
//! - [`Registry`], which owns the application's single shared handle.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gl_domain::config::GraphMcpConfig;
//! use gl_mcp_client::Registry;
//!
//! # async fn example() -> Result<(), gl_mcp_client::McpError> {
//! // Reads NEO4J_MCP_URL / NEO4J_MCP_API_KEY when the config leaves them out.
//! let registry = Registry::new(GraphMcpConfig::default());
//! let handle = registry.get(None)?;
//!
//! for (name, tool) in handle.tools().await? {
//!     println!("{name}: {}", tool.description);
//! }
//!
//! registry.reset();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod handle;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod sse;
pub mod transport;

// Re-exports for convenience.
pub use client::McpClient;
pub use error::McpError;
pub use handle::{ClientHandle, ErrorSink};
pub use protocol::{McpToolDef, ToolCallResult};
pub use registry::Registry;
pub use session::{McpSession, SessionFactory, SseSessionFactory};
pub use transport::{McpTransport, SseOptions, SseTransport, TransportError};
