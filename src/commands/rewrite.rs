//! `rewrite`: reset asset paths in an already exported skeleton JSON.

use std::path::PathBuf;

use clap::Args;

use forge_converter::rewrite::{RewriteOptions, rewrite_asset_paths};
use forge_core::AppResult;
use forge_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for the rewrite command
#[derive(Debug, Args)]
pub struct RewriteArgs {
    /// Exported skeleton JSON file
    pub json: PathBuf,

    /// Leave the `images` path untouched
    #[arg(long)]
    pub keep_image_paths: bool,

    /// Leave the `audio` path untouched
    #[arg(long)]
    pub keep_audio_paths: bool,
}

/// Execute the rewrite command
pub fn execute(args: &RewriteArgs, format: OutputFormat) -> AppResult<()> {
    if !args.json.is_file() {
        return Err(AppError::not_found(format!(
            "File not found: {}",
            args.json.display()
        )));
    }

    let options = RewriteOptions {
        reset_image_paths: !args.keep_image_paths,
        reset_audio_paths: !args.keep_audio_paths,
    };
    if !options.any() {
        return Err(AppError::validation("Nothing to rewrite: both fields are kept"));
    }

    let report = rewrite_asset_paths(&args.json, options)?;

    match format {
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Table => {
            if report.changed() {
                output::print_success(&format!(
                    "Rewrote {} in {}",
                    report.rewritten.join(", "),
                    report.path.display()
                ));
            } else {
                output::print_warning("No asset paths found, file left unchanged");
            }
            output::print_kv("Encoding", &report.encoding);
            if let Some(backup) = &report.backup {
                output::print_kv("Backup", &backup.display().to_string());
            }
        }
    }

    Ok(())
}
