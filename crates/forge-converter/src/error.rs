//! Unified error type for the Spine conversion pipeline.
//!
//! All subsystem errors (discovery, filesystem, process execution,
//! post-processing) are consolidated into a single `ConversionError` enum
//! that maps cleanly to `forge_core::error::AppError`.

use forge_core::error::AppError;
use std::path::PathBuf;
use thiserror::Error;

use crate::discovery::DiscoveryError;

/// Unified error type for all conversion operations.
#[derive(Debug, Error)]
pub enum ConversionError {
    // --- Setup errors ---
    /// No usable Spine executable could be located.
    #[error("Spine executable not found: {0}")]
    ExecutableNotFound(#[from] DiscoveryError),

    /// The project file to convert does not exist.
    #[error("Input file not found: {path}")]
    InputFileNotFound {
        /// The missing input path.
        path: PathBuf,
    },

    /// The output directory could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    OutputDirectoryCreateFailed {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A user-supplied export settings file is unusable.
    #[error("Invalid export settings {path}: {reason}")]
    InvalidExportSettings {
        /// The offending settings file.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    // --- Process execution errors ---
    /// Spine did not exit within the configured timeout and was killed.
    #[error("Spine process timed out after {timeout_seconds}s")]
    ProcessTimeout {
        /// The timeout duration that was exceeded.
        timeout_seconds: u64,
    },

    /// Spine exited with a non-zero status.
    #[error("Spine exited with code {code}: {stderr}")]
    ProcessNonZeroExit {
        /// The exit code.
        code: i32,
        /// Captured stderr output.
        stderr: String,
        /// Captured stdout output.
        stdout: String,
    },

    /// Spine was terminated by a signal.
    #[error("Spine process was terminated without an exit code")]
    ProcessTerminated,

    /// The conversion was cancelled via cancellation token.
    #[error("Conversion was cancelled")]
    Cancelled,

    // --- Post-processing ---
    /// Rewriting asset paths in the exported JSON failed.
    #[error("Post-processing failed for {path}: {reason}")]
    PostProcessingFailed {
        /// The JSON file being rewritten.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    // --- Generic errors ---
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match &err {
            ConversionError::ExecutableNotFound(_) | ConversionError::InputFileNotFound { .. } => {
                AppError::not_found(err.to_string())
            }
            ConversionError::InvalidExportSettings { .. } => AppError::validation(err.to_string()),
            ConversionError::ProcessTimeout { .. }
            | ConversionError::ProcessNonZeroExit { .. }
            | ConversionError::ProcessTerminated => AppError::external_process(err.to_string()),
            ConversionError::Cancelled => AppError::cancelled(err.to_string()),
            ConversionError::OutputDirectoryCreateFailed { .. }
            | ConversionError::Io(_)
            | ConversionError::PostProcessingFailed { .. } => AppError::storage(err.to_string()),
            _ => AppError::internal(err.to_string()),
        }
    }
}
