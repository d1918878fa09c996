//! Connection settings for the Neo4j knowledge-graph MCP server.
//!
//! Every field can be left out of the TOML file: the base URL and API key
//! then fall back to the `NEO4J_MCP_URL` / `NEO4J_MCP_API_KEY` environment
//! variables (the names themselves are configurable).

use serde::{Deserialize, Serialize};

/// Default environment variable holding the server base URL.
pub const DEFAULT_URL_ENV: &str = "NEO4J_MCP_URL";

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "NEO4J_MCP_API_KEY";

/// Path appended after the API key segment of the server URL.
pub const MCP_PATH_SUFFIX: &str = "api/mcp/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMcpConfig {
    /// Base server URL. When `None`, read from `url_env` at construction time.
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key. When `None`, read from `api_key_env` by the registry.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "d_url_env")]
    pub url_env: String,

    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,

    /// How long to wait for the SSE stream to announce its message endpoint.
    #[serde(default = "d_10000")]
    pub connect_timeout_ms: u64,

    /// How long to wait for a JSON-RPC response on the event stream.
    #[serde(default = "d_30000")]
    pub request_timeout_ms: u64,

    /// `clientInfo.name` reported during the MCP handshake.
    #[serde(default = "d_client_name")]
    pub client_name: String,
}

impl Default for GraphMcpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            url_env: d_url_env(),
            api_key_env: d_api_key_env(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            client_name: d_client_name(),
        }
    }
}

impl GraphMcpConfig {
    /// Resolve the base URL from the config, then the process environment.
    pub fn resolve_base_url(&self) -> Option<String> {
        self.resolve_base_url_with(env_lookup)
    }

    /// Like [`resolve_base_url`](Self::resolve_base_url) with a custom
    /// environment lookup.
    pub fn resolve_base_url_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        non_empty(self.base_url.clone()).or_else(|| non_empty(lookup(&self.url_env)))
    }

    /// Resolve the API key: explicit override, then config, then environment.
    pub fn resolve_api_key(&self, override_key: Option<&str>) -> Option<String> {
        self.resolve_api_key_with(override_key, env_lookup)
    }

    pub fn resolve_api_key_with<F>(&self, override_key: Option<&str>, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        non_empty(override_key.map(str::to_owned))
            .or_else(|| non_empty(self.api_key.clone()))
            .or_else(|| non_empty(lookup(&self.api_key_env)))
    }
}

/// Join base URL, API key and the fixed MCP path.
///
/// The join is exact: neither the base URL nor the key is normalised or
/// percent-encoded, so callers must pass a URL-safe key.
pub fn build_server_url(base_url: &str, api_key: &str) -> String {
    format!("{base_url}/{api_key}/{MCP_PATH_SUFFIX}")
}

/// Mask a secret for display, keeping at most four characters at each end.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.trim().chars().collect();
    let n = chars.len();
    if n <= 10 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[n - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Mask the API key segment of a server URL built by [`build_server_url`].
///
/// Only the key's own path segment is masked; text elsewhere in the URL
/// that happens to contain the key is left alone. URLs of any other shape
/// have whole path segments equal to the key masked.
pub fn redact_api_key(url: &str, api_key: &str) -> String {
    if api_key.is_empty() {
        return url.to_string();
    }
    let masked = mask_secret(api_key);

    let tail = format!("/{api_key}/{MCP_PATH_SUFFIX}");
    if let Some(base_url) = url.strip_suffix(&tail) {
        return build_server_url(base_url, &masked);
    }

    url.split('/')
        .map(|segment| if segment == api_key { masked.as_str() } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ── serde default helpers ───────────────────────────────────────────

fn d_url_env() -> String {
    DEFAULT_URL_ENV.into()
}
fn d_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.into()
}
fn d_10000() -> u64 {
    10_000
}
fn d_30000() -> u64 {
    30_000
}
fn d_client_name() -> String {
    "graphlink".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
