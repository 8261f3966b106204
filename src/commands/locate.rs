//! `locate`: show which Spine executable would be used.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use serde::Serialize;

use forge_converter::ExecutableDiscovery;
use forge_converter::discovery::probe_version;
use forge_converter::error::ConversionError;
use forge_core::config::AppConfig;
use forge_core::AppResult;

use crate::output::{self, OutputFormat};

/// Arguments for the locate command
#[derive(Debug, Args)]
pub struct LocateArgs {
    /// Explicit path to try first
    #[arg(long)]
    pub spine: Option<PathBuf>,

    /// Run `--version` on the executable
    #[arg(long)]
    pub probe_version: bool,
}

#[derive(Debug, Serialize)]
struct LocateOutput {
    path: PathBuf,
    install_dir: Option<PathBuf>,
    method: String,
    version: Option<String>,
}

/// Execute the locate command
pub async fn execute(
    args: &LocateArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> AppResult<()> {
    let explicit = args
        .spine
        .as_deref()
        .or(config.converter.spine_path.as_deref());

    let mut location = ExecutableDiscovery::new()
        .resolve(explicit)
        .map_err(ConversionError::from)?;

    if args.probe_version {
        let timeout = Duration::from_secs(config.converter.version_probe_timeout_seconds);
        location.version = probe_version(&location.path, timeout).await;
    }

    match format {
        OutputFormat::Json => output::print_json(&LocateOutput {
            path: location.path.clone(),
            install_dir: location.install_dir().map(PathBuf::from),
            method: location.discovery_method.to_string(),
            version: location.version.clone(),
        }),
        OutputFormat::Table => {
            output::print_success("Spine executable found");
            output::print_kv("Path", &location.path.display().to_string());
            if let Some(dir) = location.install_dir() {
                output::print_kv("Install dir", &dir.display().to_string());
            }
            output::print_kv("Found via", &location.discovery_method.to_string());
            if args.probe_version {
                output::print_kv(
                    "Version",
                    location.version.as_deref().unwrap_or("unknown"),
                );
            }
        }
    }

    Ok(())
}
