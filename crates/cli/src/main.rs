use clap::Parser;
use tracing_subscriber::EnvFilter;

use gl_cli::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing();

    match cli.command {
        Command::Tools { api_key, json } => {
            let (config, _) = gl_cli::cli::load_config()?;
            gl_cli::cli::tools::list(config, api_key, json).await
        }
        Command::Call { tool, args, api_key } => {
            let (config, _) = gl_cli::cli::load_config()?;
            let ok = gl_cli::cli::tools::call(config, api_key, &tool, &args).await?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Url { api_key } => {
            let (config, _) = gl_cli::cli::load_config()?;
            gl_cli::cli::tools::url(config, api_key)
        }
        Command::Doctor => {
            let (config, config_path) = gl_cli::cli::load_config()?;
            let passed = gl_cli::cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = gl_cli::cli::load_config()?;
            let valid = gl_cli::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _) = gl_cli::cli::load_config()?;
            gl_cli::cli::config::show(&config)
        }
        Command::Version => {
            println!("graphlink {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Compact human-readable logs on stderr so stdout stays clean for output.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
