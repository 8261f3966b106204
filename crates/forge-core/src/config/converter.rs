//! Spine converter configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Configuration for the Spine export orchestrator.
///
/// If `spine_path` is not set, the executable is auto-discovered through
/// the registry, common installation directories and `SPINE_PATH`.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Explicit path to the Spine executable (`Spine.exe`, `Spine.com` or `spine`).
    pub spine_path: Option<PathBuf>,

    /// Timeout in seconds for a single Spine export invocation.
    #[validate(range(min = 1, max = 7200))]
    pub timeout_seconds: u64,

    /// Timeout in seconds for the `--version` probe.
    #[validate(range(min = 1, max = 120))]
    pub version_probe_timeout_seconds: u64,

    /// Root directory for staging and export-settings temp files.
    ///
    /// Defaults to the system temp directory.
    pub temp_root: Option<PathBuf>,

    /// Export settings template used when a job does not supply one.
    ///
    /// Defaults to `config/DefaultExportSettings.json` next to the binary.
    pub default_settings_path: Option<PathBuf>,

    /// Force a UTF-8 locale in the child environment.
    pub force_utf8_env: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            spine_path: None,
            timeout_seconds: default_timeout_seconds(),
            version_probe_timeout_seconds: default_version_probe_timeout_seconds(),
            temp_root: None,
            default_settings_path: None,
            force_utf8_env: true,
        }
    }
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_version_probe_timeout_seconds() -> u64 {
    10
}

impl ConverterConfig {
    /// Resolve the effective temp root directory.
    pub fn effective_temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}
