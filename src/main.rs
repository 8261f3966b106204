//! Spine Forge: headless Spine export orchestrator.
//!
//! Loads configuration, initialises logging and dispatches the CLI.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use forge_core::config::AppConfig;
use forge_core::error::AppError;

mod commands;
mod output;

use commands::Cli;

/// Environment variable selecting the `config/{env}.toml` overlay.
const ENV_VAR: &str = "SPINE_FORGE_ENV";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = cli.execute(config).await {
        tracing::debug!(kind = %e.kind, "Command failed");
        output::print_error(&e.message);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration(cli: &Cli) -> Result<AppConfig, AppError> {
    let env = std::env::var(ENV_VAR).unwrap_or_else(|_| "development".to_string());
    AppConfig::load(cli.config.as_deref(), &env)
}

/// Initialize tracing/logging. Logs go to stderr so command output stays clean.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
