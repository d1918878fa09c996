//! `gl-domain`: shared types for the graphlink crates.
//!
//! Holds the workspace-wide [`error::Error`] type and the configuration
//! model (TOML file + environment fallbacks) consumed by the MCP client
//! and the CLI.

pub mod config;
pub mod error;
