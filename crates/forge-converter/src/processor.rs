//! Conversion processor: runs export jobs one after another with staging,
//! timeout, cancellation, post-processing and metrics.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use forge_core::config::ConverterConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::discovery::{DiscoveryError, ExecutableDiscovery, ExecutableLocation};
use crate::error::ConversionError;
use crate::executor::{ProcessStatus, SpineExecutor, SpineInvocation};
use crate::metrics::ConversionMetrics;
use crate::models::{BatchReport, ConversionJob, ConversionResult};
use crate::observer::{ConversionObserver, TracingObserver};
use crate::rewrite::{RewriteOptions, find_exported_json, rewrite_asset_paths};
use crate::settings::ExportSettingsBuilder;
use crate::staging::{JobScratch, StagedPaths, copy_dir_recursive, stage_job};

/// Extensions of files Spine produces for a skeleton.
const ARTIFACT_EXTENSIONS: &[&str] = &["json", "skel", "atlas", "png"];

/// Runs Spine export jobs.
pub struct ConversionProcessor {
    config: ConverterConfig,
    discovery: ExecutableDiscovery,
    settings: ExportSettingsBuilder,
    executor: SpineExecutor,
    observer: Arc<dyn ConversionObserver>,
    metrics: Arc<ConversionMetrics>,
    executable: OnceLock<ExecutableLocation>,
}

impl ConversionProcessor {
    /// Create a processor from configuration.
    pub fn new(config: ConverterConfig) -> Self {
        let settings = match &config.default_settings_path {
            Some(path) => ExportSettingsBuilder::new(Some(path.clone())),
            None => ExportSettingsBuilder::for_current_exe(),
        };

        Self {
            discovery: ExecutableDiscovery::new(),
            executor: SpineExecutor::from_config(&config),
            observer: Arc::new(TracingObserver),
            metrics: Arc::new(ConversionMetrics::new()),
            executable: OnceLock::new(),
            settings,
            config,
        }
    }

    /// Replace the executable discovery.
    pub fn with_discovery(mut self, discovery: ExecutableDiscovery) -> Self {
        self.discovery = discovery;
        self
    }

    /// Replace the progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn ConversionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the export settings builder.
    pub fn with_settings_builder(mut self, settings: ExportSettingsBuilder) -> Self {
        self.settings = settings;
        self
    }

    /// Override the per-job timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.executor = SpineExecutor::new(timeout, self.config.force_utf8_env);
        self
    }

    /// Shared metrics collector.
    pub fn metrics(&self) -> Arc<ConversionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Resolve the Spine executable, caching the first success.
    pub fn resolve_executable(&self) -> Result<ExecutableLocation, DiscoveryError> {
        if let Some(location) = self.executable.get() {
            return Ok(location.clone());
        }
        let location = self.discovery.resolve(self.config.spine_path.as_deref())?;
        Ok(self.executable.get_or_init(|| location).clone())
    }

    /// Convert a single job.
    pub async fn convert_job(
        &self,
        job: &ConversionJob,
        cancel: &CancellationToken,
    ) -> ConversionResult {
        self.convert_indexed(job, 0, 1, cancel).await
    }

    /// Convert jobs strictly in order. A failed job never stops the batch.
    pub async fn convert_batch(
        &self,
        jobs: &[ConversionJob],
        cancel: &CancellationToken,
    ) -> BatchReport {
        let total = jobs.len();
        info!(total, "Starting export batch");

        let mut results = Vec::with_capacity(total);
        for (index, job) in jobs.iter().enumerate() {
            results.push(self.convert_indexed(job, index, total, cancel).await);
        }

        let report = BatchReport::from_results(results, self.metrics.snapshot());
        info!(
            total,
            succeeded = report.succeeded,
            failed = report.failed,
            "Export batch finished"
        );
        report
    }

    #[instrument(skip(self, job, cancel), fields(source = %job.source.display()))]
    async fn convert_indexed(
        &self,
        job: &ConversionJob,
        index: usize,
        total: usize,
        cancel: &CancellationToken,
    ) -> ConversionResult {
        self.observer.job_started(index, total, job);
        self.metrics.record_started();

        let start = Instant::now();
        let mut result = ConversionResult::pending(job);

        let outcome = if cancel.is_cancelled() {
            Err(ConversionError::Cancelled)
        } else {
            self.run_job(job, &mut result, cancel).await
        };

        let elapsed = start.elapsed();
        result.duration_ms = elapsed.as_millis() as u64;

        match outcome {
            Ok(()) => {
                result.success = true;
                self.metrics.record_success(elapsed);
            }
            Err(e) => {
                match &e {
                    ConversionError::ProcessTimeout { .. } => self.metrics.record_timeout(),
                    ConversionError::Cancelled => self.metrics.record_cancelled(),
                    _ => self.metrics.record_failure(),
                }
                result.fail(&e);
            }
        }

        self.observer.job_finished(index, total, &result);
        result
    }

    /// Validate, then run the job inside a scratch directory that is removed
    /// on every exit path.
    async fn run_job(
        &self,
        job: &ConversionJob,
        result: &mut ConversionResult,
        cancel: &CancellationToken,
    ) -> Result<(), ConversionError> {
        if !job.source.is_file() {
            return Err(ConversionError::InputFileNotFound {
                path: job.source.clone(),
            });
        }

        if job.options.data_format().is_none() {
            return Err(ConversionError::InvalidExportSettings {
                path: job.source.clone(),
                reason: "neither JSON nor binary export is enabled".to_string(),
            });
        }

        let executable = self.resolve_executable()?;

        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .map_err(|source| ConversionError::OutputDirectoryCreateFailed {
                path: job.output_dir.clone(),
                source,
            })?;

        let temp_root = self.config.effective_temp_root();
        let scratch = JobScratch::create(&temp_root).await?;
        let outcome = self
            .run_in_scratch(job, &executable, &scratch, result, cancel)
            .await;
        scratch.cleanup().await;
        outcome
    }

    async fn run_in_scratch(
        &self,
        job: &ConversionJob,
        executable: &ExecutableLocation,
        scratch: &JobScratch,
        result: &mut ConversionResult,
        cancel: &CancellationToken,
    ) -> Result<(), ConversionError> {
        let staged = stage_job(scratch, &job.source, &job.output_dir).await?;
        if staged.any_staged() {
            self.metrics.record_staged();
            info!(
                input_staged = staged.input_staged(),
                output_staged = staged.output_staged,
                "Using ASCII staging paths"
            );
        }

        let (document, source) = self.settings.build(
            job.export_settings.as_deref(),
            &staged.input,
            &staged.output,
            &job.options,
        );
        let settings_path = scratch.settings_path();
        document.write_to(&settings_path)?;
        debug!(settings = %settings_path.display(), ?source, "Wrote export settings");

        let invocation = SpineInvocation {
            executable: executable.path.clone(),
            input: staged.input.clone(),
            output: staged.output.clone(),
            settings: settings_path,
        };

        let output = self
            .executor
            .run(&invocation, Arc::clone(&self.observer), cancel)
            .await?;

        result.exit_code = output.exit_code();
        result.stdout = output.stdout.clone();
        result.stderr = output.stderr.clone();

        match output.status {
            ProcessStatus::Exited(0) => {}
            ProcessStatus::Exited(code) => {
                return Err(ConversionError::ProcessNonZeroExit {
                    code,
                    stderr: output.stderr.join("\n"),
                    stdout: output.stdout.join("\n"),
                });
            }
            ProcessStatus::TimedOut => {
                return Err(ConversionError::ProcessTimeout {
                    timeout_seconds: self.executor.timeout().as_secs(),
                });
            }
            ProcessStatus::Cancelled => return Err(ConversionError::Cancelled),
            ProcessStatus::Signalled => return Err(ConversionError::ProcessTerminated),
        }

        if staged.output_staged {
            let copied = copy_dir_recursive(&staged.output, &job.output_dir).await?;
            debug!(copied, dest = %job.output_dir.display(), "Copied staged output back");
        }

        let stems = result_stems(job, &staged);
        result.produced_files = list_artifacts(&job.output_dir, &stems);
        if result.produced_files.is_empty() {
            warn!(
                dir = %job.output_dir.display(),
                "Spine reported success but no export artifacts were found"
            );
        }

        if job.options.wants_rewrite() {
            self.post_process(job, &stems, result);
        }

        Ok(())
    }

    /// Rewrite asset paths in the exported JSON. Failures are logged only.
    fn post_process(&self, job: &ConversionJob, stems: &[String], result: &mut ConversionResult) {
        let stem_refs: Vec<&str> = stems.iter().map(String::as_str).collect();
        let Some(json_path) = find_exported_json(&job.output_dir, &stem_refs) else {
            return;
        };

        let options = RewriteOptions {
            reset_image_paths: job.options.reset_image_paths,
            reset_audio_paths: job.options.reset_audio_paths,
        };

        match rewrite_asset_paths(&json_path, options) {
            Ok(report) => {
                if report.changed() {
                    self.metrics.record_rewrite();
                }
                result.rewritten_fields = report.rewritten;
            }
            Err(e) => {
                warn!(path = %json_path.display(), error = %e, "Asset path rewrite failed");
            }
        }
    }
}

/// Stems the exported files may carry: the project's own, then the staged one.
fn result_stems(job: &ConversionJob, staged: &StagedPaths) -> Vec<String> {
    let mut stems = vec![job.project_stem()];
    if let Some(stem) = &staged.staged_stem {
        if !stems.contains(stem) {
            stems.push(stem.clone());
        }
    }
    stems
}

/// Files in `dir` whose name starts with one of `stems` and that carry an
/// export artifact extension.
fn list_artifacts(dir: &Path, stems: &[String]) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            let ext_ok = p
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| ARTIFACT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            let stem_ok = p
                .file_stem()
                .map(|s| s.to_string_lossy())
                .map(|s| stems.iter().any(|stem| s.starts_with(stem.as_str())))
                .unwrap_or(false);
            ext_ok && stem_ok
        })
        .collect();
    files.sort();
    files
}
