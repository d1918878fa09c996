use std::collections::HashMap;

use gl_domain::config::Config;
use gl_mcp_client::{McpToolDef, Registry};

/// List the server's tools on stdout.
pub async fn list(config: Config, api_key: Option<String>, json: bool) -> anyhow::Result<()> {
    let registry = Registry::new(config.mcp);
    let handle = registry.get(api_key.as_deref())?;

    let result = handle.tools().await;
    handle.disconnect().await;
    let tools = result?;

    if json {
        let mut sorted: Vec<&McpToolDef> = tools.values().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        println!("{}", serde_json::to_string_pretty(&sorted)?);
    } else {
        print!("{}", render_table(&tools));
    }
    Ok(())
}

/// Call one tool and print its text content.
///
/// Returns `false` when the server flagged the result as an error.
pub async fn call(config: Config, api_key: Option<String>, tool: &str, args: &str) -> anyhow::Result<bool> {
    let arguments: serde_json::Value =
        serde_json::from_str(args).map_err(|e| anyhow::anyhow!("--args is not valid JSON: {e}"))?;
    if !arguments.is_object() {
        anyhow::bail!("--args must be a JSON object");
    }

    let registry = Registry::new(config.mcp);
    let handle = registry.get(api_key.as_deref())?;

    let result = handle.call_tool(tool, arguments).await;
    handle.disconnect().await;
    let result = result?;

    println!("{}", result.text());
    Ok(!result.is_error)
}

/// Print the derived server URL with the API key masked.
pub fn url(config: Config, api_key: Option<String>) -> anyhow::Result<()> {
    let registry = Registry::new(config.mcp);
    let handle = registry.get(api_key.as_deref())?;
    println!("{}", handle.redacted_url());
    Ok(())
}

/// One line per tool, sorted by name: `name  description`.
pub fn render_table(tools: &HashMap<String, McpToolDef>) -> String {
    if tools.is_empty() {
        return "(no tools)\n".to_string();
    }

    let mut names: Vec<&String> = tools.keys().collect();
    names.sort();
    let width = names.iter().map(|n| n.len()).max().unwrap_or(0);

    let mut out = String::new();
    for name in names {
        let description = tools[name.as_str()].description.lines().next().unwrap_or("");
        out.push_str(&format!("{name:<width$}  {description}\n"));
    }
    out
}
