//! `convert`: export Spine projects.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use forge_converter::models::{ConversionJob, ExportOptions};
use forge_converter::{ConversionProcessor, resolve_project_inputs};
use forge_core::config::AppConfig;
use forge_core::AppResult;
use forge_core::error::AppError;

use crate::output::{self, ConsoleObserver, OutputFormat};

/// Arguments for the convert command
#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// `.spine` files, or directories containing them
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for the export
    #[arg(short, long)]
    pub output: PathBuf,

    /// Path to the Spine executable (overrides configuration and discovery)
    #[arg(long)]
    pub spine: Option<PathBuf>,

    /// Custom export settings JSON
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Export binary `.skel` instead of JSON
    #[arg(long)]
    pub binary: bool,

    /// Do not export JSON
    #[arg(long)]
    pub no_json: bool,

    /// Do not pack a texture atlas
    #[arg(long)]
    pub no_pack: bool,

    /// Premultiply alpha in packed textures
    #[arg(long)]
    pub premultiply_alpha: bool,

    /// Maximum atlas page width
    #[arg(long)]
    pub max_width: Option<u32>,

    /// Maximum atlas page height
    #[arg(long)]
    pub max_height: Option<u32>,

    /// Leave the `images` path in the exported JSON untouched
    #[arg(long)]
    pub keep_image_paths: bool,

    /// Leave the `audio` path in the exported JSON untouched
    #[arg(long)]
    pub keep_audio_paths: bool,

    /// Per-project timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Scan input directories recursively
    #[arg(short, long)]
    pub recursive: bool,
}

impl ConvertArgs {
    fn export_options(&self) -> ExportOptions {
        ExportOptions {
            export_json: !self.no_json,
            export_binary: self.binary,
            pack_atlas: !self.no_pack,
            premultiply_alpha: self.premultiply_alpha,
            max_width: self.max_width,
            max_height: self.max_height,
            reset_image_paths: !self.keep_image_paths,
            reset_audio_paths: !self.keep_audio_paths,
        }
    }
}

/// Execute the convert command
pub async fn execute(
    args: &ConvertArgs,
    mut config: AppConfig,
    format: OutputFormat,
) -> AppResult<()> {
    if let Some(spine) = &args.spine {
        config.converter.spine_path = Some(spine.clone());
    }
    if let Some(timeout) = args.timeout {
        config.converter.timeout_seconds = timeout;
    }
    config.converter.validate()?;

    let options = args.export_options();
    if options.data_format().is_none() {
        return Err(AppError::validation("--no-json requires --binary"));
    }

    let projects = resolve_project_inputs(&args.inputs, args.recursive).await?;
    if projects.is_empty() {
        return Err(AppError::not_found("No .spine projects found in the given inputs"));
    }

    let jobs: Vec<ConversionJob> = projects
        .into_iter()
        .map(|source| {
            let job = ConversionJob::new(source, &args.output).with_options(options.clone());
            match &args.settings {
                Some(settings) => job.with_export_settings(settings),
                None => job,
            }
        })
        .collect();

    let observer = ConsoleObserver {
        echo_output: config.logging.echo_process_output,
    };
    let processor = ConversionProcessor::new(config.converter).with_observer(Arc::new(observer));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling remaining exports");
            ctrl_c.cancel();
        }
    });

    let report = processor.convert_batch(&jobs, &cancel).await;
    output::print_report(&report, format);

    if report.all_succeeded() {
        Ok(())
    } else {
        Err(AppError::external_process(format!(
            "{} of {} exports failed",
            report.failed,
            report.total()
        )))
    }
}
