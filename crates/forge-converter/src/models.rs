//! Domain models: jobs, export options, per-job results, batch reports.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConversionError;
use crate::metrics::MetricsSnapshot;

/// File extension of Spine project files.
pub const PROJECT_EXTENSION: &str = "spine";

// ---------------------------------------------------------------------------
// ExportOptions
// ---------------------------------------------------------------------------

/// Skeleton data format written by Spine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Json,
    Binary,
}

/// User-facing export switches for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Export skeleton data as JSON.
    pub export_json: bool,
    /// Export skeleton data as binary `.skel` (wins over JSON when both are set).
    pub export_binary: bool,
    /// Pack attachments into a texture atlas.
    pub pack_atlas: bool,
    /// Premultiply alpha in packed textures.
    pub premultiply_alpha: bool,
    /// Maximum atlas page width; only positive values override the template.
    pub max_width: Option<u32>,
    /// Maximum atlas page height; only positive values override the template.
    pub max_height: Option<u32>,
    /// Rewrite the `images` path of the exported JSON to `./images/`.
    pub reset_image_paths: bool,
    /// Rewrite the `audio` path of the exported JSON to an empty string.
    pub reset_audio_paths: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_json: true,
            export_binary: false,
            pack_atlas: true,
            premultiply_alpha: false,
            max_width: None,
            max_height: None,
            reset_image_paths: true,
            reset_audio_paths: true,
        }
    }
}

impl ExportOptions {
    /// The skeleton format to export, or `None` when both formats are off.
    pub fn data_format(&self) -> Option<DataFormat> {
        if self.export_binary {
            Some(DataFormat::Binary)
        } else if self.export_json {
            Some(DataFormat::Json)
        } else {
            None
        }
    }

    /// Whether the exported JSON should be post-processed. Never true for
    /// binary exports.
    pub fn wants_rewrite(&self) -> bool {
        self.data_format() == Some(DataFormat::Json)
            && (self.reset_image_paths || self.reset_audio_paths)
    }

    /// Effective max width override (zero is treated as "not set").
    pub fn max_width_override(&self) -> Option<u32> {
        self.max_width.filter(|w| *w > 0)
    }

    /// Effective max height override (zero is treated as "not set").
    pub fn max_height_override(&self) -> Option<u32> {
        self.max_height.filter(|h| *h > 0)
    }
}

// ---------------------------------------------------------------------------
// ConversionJob
// ---------------------------------------------------------------------------

/// One unit of work: a single project file exported into a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Path to the `.spine` project file.
    pub source: PathBuf,
    /// Directory the export is written to.
    pub output_dir: PathBuf,
    /// Custom export settings document; `None` uses the default template.
    pub export_settings: Option<PathBuf>,
    /// Export switches.
    pub options: ExportOptions,
}

impl ConversionJob {
    /// Create a job with default options.
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            export_settings: None,
            options: ExportOptions::default(),
        }
    }

    /// Attach a custom export settings document.
    pub fn with_export_settings(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_settings = Some(path.into());
        self
    }

    /// Replace the export options.
    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    /// File stem of the project (`hero` for `hero.spine`).
    pub fn project_stem(&self) -> String {
        self.source
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "project".to_string())
    }

    /// File name of the project for log messages.
    pub fn display_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// Returns `true` if the path has the `.spine` extension (case-insensitive).
pub fn is_project_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(PROJECT_EXTENSION))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// FailureReason
// ---------------------------------------------------------------------------

/// Serializable summary of why a job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// No Spine executable could be located.
    ExecutableNotFound,
    /// The project file does not exist.
    InputFileNotFound,
    /// The output directory could not be created.
    OutputDirectoryCreateFailed,
    /// Spine exceeded the timeout and was killed.
    Timeout,
    /// Spine exited with a non-zero code.
    NonZeroExit {
        /// The exit code.
        code: i32,
    },
    /// Spine was terminated by a signal.
    Terminated,
    /// The batch was cancelled.
    Cancelled,
    /// The export settings document could not be prepared.
    InvalidExportSettings,
    /// Any other I/O or internal failure.
    Internal,
}

impl From<&ConversionError> for FailureReason {
    fn from(err: &ConversionError) -> Self {
        match err {
            ConversionError::ExecutableNotFound(_) => Self::ExecutableNotFound,
            ConversionError::InputFileNotFound { .. } => Self::InputFileNotFound,
            ConversionError::OutputDirectoryCreateFailed { .. } => {
                Self::OutputDirectoryCreateFailed
            }
            ConversionError::ProcessTimeout { .. } => Self::Timeout,
            ConversionError::ProcessNonZeroExit { code, .. } => Self::NonZeroExit { code: *code },
            ConversionError::ProcessTerminated => Self::Terminated,
            ConversionError::Cancelled => Self::Cancelled,
            ConversionError::InvalidExportSettings { .. } => Self::InvalidExportSettings,
            _ => Self::Internal,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExecutableNotFound => write!(f, "executable not found"),
            Self::InputFileNotFound => write!(f, "input not found"),
            Self::OutputDirectoryCreateFailed => write!(f, "output dir failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::NonZeroExit { code } => write!(f, "exit code {}", code),
            Self::Terminated => write!(f, "terminated"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::InvalidExportSettings => write!(f, "invalid export settings"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConversionResult
// ---------------------------------------------------------------------------

/// Outcome of one job. Produced for every job, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// The project file that was converted.
    pub source: PathBuf,
    /// The requested output directory.
    pub output_dir: PathBuf,
    /// Whether the export succeeded.
    pub success: bool,
    /// Why the job failed, if it did.
    pub failure: Option<FailureReason>,
    /// Human-readable error message, if the job failed.
    pub error: Option<String>,
    /// Exit code reported by Spine, when it exited normally.
    pub exit_code: Option<i32>,
    /// Captured stdout lines.
    pub stdout: Vec<String>,
    /// Captured stderr lines.
    pub stderr: Vec<String>,
    /// JSON fields rewritten during post-processing (`images`, `audio`).
    pub rewritten_fields: Vec<String>,
    /// Export artifacts found in the output directory.
    pub produced_files: Vec<PathBuf>,
    /// When the job started.
    pub started_at: DateTime<Utc>,
    /// Total job duration in milliseconds.
    pub duration_ms: u64,
}

impl ConversionResult {
    /// Create an empty, not-yet-successful result for a job.
    pub fn pending(job: &ConversionJob) -> Self {
        Self {
            source: job.source.clone(),
            output_dir: job.output_dir.clone(),
            success: false,
            failure: None,
            error: None,
            exit_code: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            rewritten_fields: Vec::new(),
            produced_files: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Record a failure on this result.
    pub fn fail(&mut self, err: &ConversionError) {
        self.success = false;
        self.failure = Some(FailureReason::from(err));
        self.error = Some(err.to_string());
    }
}

// ---------------------------------------------------------------------------
// BatchReport
// ---------------------------------------------------------------------------

/// Outcome of a sequential batch of jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Per-job results, in submission order.
    pub results: Vec<ConversionResult>,
    /// Number of successful jobs.
    pub succeeded: usize,
    /// Number of failed jobs.
    pub failed: usize,
    /// Metrics collected over the processor's lifetime.
    pub metrics: MetricsSnapshot,
}

impl BatchReport {
    /// Build a report from ordered results.
    pub fn from_results(results: Vec<ConversionResult>, metrics: MetricsSnapshot) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        Self {
            results,
            succeeded,
            failed,
            metrics,
        }
    }

    /// Total jobs in the batch.
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Whether every job succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
