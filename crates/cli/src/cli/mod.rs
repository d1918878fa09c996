pub mod config;
pub mod doctor;
pub mod tools;

use clap::{Parser, Subcommand};

/// Inspect a Neo4j knowledge-graph MCP server.
#[derive(Debug, Parser)]
#[command(name = "graphlink", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the tools the server exposes.
    Tools {
        /// API key (defaults to the config file, then NEO4J_MCP_API_KEY).
        #[arg(long)]
        api_key: Option<String>,
        /// Print full tool descriptors as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Call a single tool and print its text output.
    Call {
        /// Tool name, e.g. `read-neo4j-cypher`.
        tool: String,
        /// Tool arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Print the derived server URL (API key masked).
    Url {
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `GL_CONFIG` (or
/// `graphlink.toml` by default). Returns the parsed [`Config`] and the
/// path that was used.
///
/// [`Config`]: gl_domain::config::Config
pub fn load_config() -> anyhow::Result<(gl_domain::config::Config, String)> {
    let config_path = std::env::var("GL_CONFIG").unwrap_or_else(|_| "graphlink.toml".into());
    let config = gl_domain::config::Config::load_or_default(&config_path)
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    tracing::debug!(path = %config_path, "loaded config");
    Ok((config, config_path))
}
