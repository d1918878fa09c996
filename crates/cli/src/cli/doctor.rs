use gl_domain::config::{Config, ConfigSeverity};
use gl_mcp_client::Registry;

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("graphlink doctor");
    println!("================\n");

    let mut all_passed = true;

    // 1. Config file
    // A missing file is not a failure; the environment may be enough.
    check_config_file(config_path);

    // 2. Config validation
    check_config_validation(config, &mut all_passed);

    // 3. Server reachable and tools listed
    check_server(config, &mut all_passed).await;

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults and environment)")
        },
    );
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_server(config: &Config, all_passed: &mut bool) {
    let registry = Registry::new(config.mcp.clone());
    let handle = match registry.get(None) {
        Ok(handle) => handle,
        Err(e) => {
            print_check("MCP server", false, e.to_string());
            *all_passed = false;
            return;
        }
    };

    let url = handle.redacted_url();
    match handle.tools().await {
        Ok(tools) => {
            print_check("MCP server", true, format!("{url} ({} tool(s))", tools.len()));
        }
        Err(e) => {
            print_check("MCP server", false, format!("{url} ({e})"));
            *all_passed = false;
        }
    }
    handle.disconnect().await;
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
