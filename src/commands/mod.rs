//! CLI command definitions and dispatch.

pub mod config;
pub mod convert;
pub mod locate;
pub mod rewrite;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use forge_core::config::AppConfig;
use forge_core::AppResult;

/// Spine Forge: drive the Spine editor's CLI to export projects headlessly
#[derive(Debug, Parser)]
#[command(name = "spine-forge", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to `config/default.toml` when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Export one or more Spine projects
    Convert(convert::ConvertArgs),
    /// Locate the Spine executable
    Locate(locate::LocateArgs),
    /// Rewrite asset paths in an exported skeleton JSON
    Rewrite(rewrite::RewriteArgs),
    /// Show the effective configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> AppResult<()> {
        match &self.command {
            Commands::Convert(args) => convert::execute(args, config, self.format).await,
            Commands::Locate(args) => locate::execute(args, &config, self.format).await,
            Commands::Rewrite(args) => rewrite::execute(args, self.format),
            Commands::Config => config::execute(&config, self.format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert_flags() {
        let cli = Cli::try_parse_from([
            "spine-forge",
            "convert",
            "art/hero.spine",
            "art/goblin",
            "--output",
            "export",
            "--max-width",
            "1024",
            "--keep-audio-paths",
            "--format",
            "json",
        ])
        .expect("parse");

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Convert(args) => {
                assert_eq!(args.inputs.len(), 2);
                assert_eq!(args.max_width, Some(1024));
                assert!(args.keep_audio_paths);
                assert!(!args.keep_image_paths);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
