use gl_domain::config::{mask_secret, Config, ConfigError, ConfigSeverity};

/// Print every validation issue followed by an error/warning tally.
///
/// `graphlink config validate` exits with status 1 when this returns
/// `false`, which happens only for `[ERROR]` issues. A missing API key is a
/// warning because it can still be supplied per command with `--api-key`.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{config_path}: no issues");
        return true;
    }

    for issue in &issues {
        println!("{issue}");
    }
    let (errors, warnings) = tally(&issues);
    println!("\n{config_path}: {errors} error(s), {warnings} warning(s)");
    errors == 0
}

fn tally(issues: &[ConfigError]) -> (usize, usize) {
    let errors = issues
        .iter()
        .filter(|issue| issue.severity == ConfigSeverity::Error)
        .count();
    (errors, issues.len() - errors)
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}

/// Serialize the config with the API key masked.
pub fn render(config: &Config) -> anyhow::Result<String> {
    let mut redacted = config.clone();
    redacted.mcp.api_key = redacted.mcp.api_key.as_deref().map(mask_secret);
    toml::to_string_pretty(&redacted).map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))
}
