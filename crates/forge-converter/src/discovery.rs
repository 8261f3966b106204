//! Spine executable discovery and validation.
//!
//! Locates the Spine command-line executable by checking, in order:
//! 1. An explicitly configured path
//! 2. The Windows registry (Esoteric Software install keys)
//! 3. Common installation directories
//! 4. The `SPINE_PATH` environment variable
//!
//! The first candidate that exists and carries an allowed file name wins.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Environment variable consulted last during discovery.
pub const SPINE_PATH_VAR: &str = "SPINE_PATH";

/// Executable names tried inside a candidate directory, in order.
const EXECUTABLE_NAMES: &[&str] = &[
    "Spine.exe",
    "Spine.com",
    "spine.exe",
    "spine.com",
    "Spine",
    "spine",
];

/// Lower-cased file names accepted as a Spine executable.
const ALLOWED_NAMES: &[&str] = &["spine.exe", "spine.com", "spine"];

/// Registry subkeys written by the Spine installer (native and WOW64 views).
#[cfg_attr(not(windows), allow(dead_code))]
const REGISTRY_KEY_PATHS: &[&str] = &[
    r"SOFTWARE\Esoteric Software\Spine",
    r"SOFTWARE\WOW6432Node\Esoteric Software\Spine",
];

/// Registry value names that may hold the install directory. `""` is the default value.
#[cfg_attr(not(windows), allow(dead_code))]
const REGISTRY_VALUE_NAMES: &[&str] = &["InstallPath", "Path", "InstallDir", ""];

/// Errors from Spine discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No candidate location produced a usable executable.
    #[error(
        "Spine executable not found. Searched: explicit path, registry, common install directories and {var}"
    )]
    NotFound {
        /// The environment variable that was consulted.
        var: String,
    },

    /// A path was given but does not point to a Spine executable.
    #[error("{path} is not a valid Spine executable: {reason}")]
    InvalidExecutable {
        /// The rejected path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },
}

/// How the executable was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Explicitly configured by the user.
    ExplicitConfig,
    /// Found via the Windows registry.
    WindowsRegistry,
    /// Found in a common installation directory.
    CommonPath,
    /// Found via the `SPINE_PATH` environment variable.
    EnvironmentVariable,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExplicitConfig => write!(f, "explicit path"),
            Self::WindowsRegistry => write!(f, "registry"),
            Self::CommonPath => write!(f, "common install directory"),
            Self::EnvironmentVariable => write!(f, "{}", SPINE_PATH_VAR),
        }
    }
}

/// A resolved, validated Spine executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutableLocation {
    /// Full path to the executable.
    pub path: PathBuf,
    /// How it was found.
    pub discovery_method: DiscoveryMethod,
    /// Version string reported by `--version`, if probed.
    pub version: Option<String>,
}

impl ExecutableLocation {
    fn new(path: PathBuf, discovery_method: DiscoveryMethod) -> Self {
        Self {
            path,
            discovery_method,
            version: None,
        }
    }

    /// Directory containing the executable.
    pub fn install_dir(&self) -> Option<&Path> {
        self.path.parent()
    }
}

// ---------------------------------------------------------------------------
// Registry abstraction
// ---------------------------------------------------------------------------

/// Source of install directories recorded by the Spine installer.
pub trait InstallRegistry: Send + Sync {
    /// Candidate install directories, in lookup order.
    fn install_dirs(&self) -> Vec<PathBuf>;
}

/// Registry that never reports anything. Used on non-Windows platforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRegistry;

impl InstallRegistry for NoRegistry {
    fn install_dirs(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Registry backed by a fixed list of directories.
#[derive(Debug, Default, Clone)]
pub struct FixedRegistry(pub Vec<PathBuf>);

impl InstallRegistry for FixedRegistry {
    fn install_dirs(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}

/// The Windows registry, queried under HKLM then HKCU.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsRegistry;

#[cfg(windows)]
impl InstallRegistry for WindowsRegistry {
    fn install_dirs(&self) -> Vec<PathBuf> {
        use winreg::RegKey;
        use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ};

        let roots = [(HKEY_LOCAL_MACHINE, "HKLM"), (HKEY_CURRENT_USER, "HKCU")];
        let mut dirs = Vec::new();

        for (root_key, root_name) in &roots {
            for key_path in REGISTRY_KEY_PATHS {
                let key = match RegKey::predef(*root_key).open_subkey_with_flags(key_path, KEY_READ)
                {
                    Ok(key) => key,
                    Err(e) => {
                        debug!(root = root_name, key = key_path, error = %e, "Registry key not present");
                        continue;
                    }
                };

                for value_name in REGISTRY_VALUE_NAMES {
                    if let Ok(value) = key.get_value::<String, _>(value_name) {
                        let trimmed = value.trim().trim_matches('"');
                        if !trimmed.is_empty() {
                            debug!(root = root_name, value_name, path = trimmed, "Registry install path");
                            dirs.push(PathBuf::from(trimmed));
                        }
                    }
                }
            }
        }

        dirs
    }
}

/// The registry appropriate for the current platform.
pub fn platform_registry() -> Box<dyn InstallRegistry> {
    #[cfg(windows)]
    {
        Box::new(WindowsRegistry)
    }
    #[cfg(not(windows))]
    {
        Box::new(NoRegistry)
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Returns `true` if the file name is an allowed Spine executable name.
pub fn is_allowed_executable_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| ALLOWED_NAMES.contains(&n.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Validate that `path` is an existing file with an allowed name.
pub fn validate_executable(path: &Path) -> Result<(), DiscoveryError> {
    if !path.is_file() {
        return Err(DiscoveryError::InvalidExecutable {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }
    if !is_allowed_executable_name(path) {
        return Err(DiscoveryError::InvalidExecutable {
            path: path.to_path_buf(),
            reason: format!("file name must be one of {}", ALLOWED_NAMES.join(", ")),
        });
    }
    Ok(())
}

/// Strip surrounding whitespace and quotes from a user-supplied path.
fn clean_path(raw: &Path) -> PathBuf {
    let s = raw.to_string_lossy();
    PathBuf::from(s.trim().trim_matches('"').trim_matches('\''))
}

/// Find the first allowed executable inside `dir`.
fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    EXECUTABLE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Accept a file with an allowed name, or a directory containing one.
fn accept_candidate(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return validate_executable(path).ok().map(|_| path.to_path_buf());
    }
    find_in_dir(path)
}

/// Common installation directories for the current platform.
pub fn common_install_dirs() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(pf) = std::env::var("ProgramFiles") {
        paths.push(PathBuf::from(pf).join("Spine"));
    }
    if let Ok(pf86) = std::env::var("ProgramFiles(x86)") {
        paths.push(PathBuf::from(pf86).join("Spine"));
    }

    #[cfg(windows)]
    {
        paths.push(PathBuf::from(r"C:\Program Files\Spine"));
        paths.push(PathBuf::from(r"C:\Program Files (x86)\Spine"));
        paths.push(PathBuf::from(r"C:\Spine"));
    }

    if let Some(local) = dirs::data_local_dir() {
        paths.push(local.join("Spine"));
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/Applications/Spine.app/Contents/MacOS"));
    }

    paths.dedup();
    paths
}

// ---------------------------------------------------------------------------
// Discovery engine
// ---------------------------------------------------------------------------

/// Spine executable discovery engine.
pub struct ExecutableDiscovery {
    registry: Box<dyn InstallRegistry>,
    common_dirs: Vec<PathBuf>,
}

impl Default for ExecutableDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutableDiscovery {
    /// Discovery with the platform registry and the standard install directories.
    pub fn new() -> Self {
        Self {
            registry: platform_registry(),
            common_dirs: common_install_dirs(),
        }
    }

    /// Replace the registry source.
    pub fn with_registry(mut self, registry: impl InstallRegistry + 'static) -> Self {
        self.registry = Box::new(registry);
        self
    }

    /// Replace the list of common installation directories.
    pub fn with_common_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.common_dirs = dirs;
        self
    }

    /// Resolve the executable.
    ///
    /// Returns the first valid candidate in the order explicit path, registry,
    /// common directories, `SPINE_PATH`.
    pub fn resolve(&self, explicit: Option<&Path>) -> Result<ExecutableLocation, DiscoveryError> {
        info!("Searching for Spine executable...");

        if let Some(raw) = explicit {
            let path = clean_path(raw);
            match accept_candidate(&path) {
                Some(found) => {
                    info!(path = %found.display(), "Using explicitly configured Spine executable");
                    return Ok(ExecutableLocation::new(found, DiscoveryMethod::ExplicitConfig));
                }
                None => {
                    warn!(
                        path = %path.display(),
                        "Configured Spine path is not a valid executable, trying fallbacks"
                    );
                }
            }
        }

        for dir in self.registry.install_dirs() {
            if let Some(found) = find_in_dir(&dir) {
                info!(path = %found.display(), "Found Spine via registry");
                return Ok(ExecutableLocation::new(found, DiscoveryMethod::WindowsRegistry));
            }
            debug!(dir = %dir.display(), "Registry install dir has no Spine executable");
        }

        for dir in &self.common_dirs {
            if let Some(found) = find_in_dir(dir) {
                info!(path = %found.display(), "Found Spine in common installation path");
                return Ok(ExecutableLocation::new(found, DiscoveryMethod::CommonPath));
            }
        }

        if let Some(value) = std::env::var_os(SPINE_PATH_VAR) {
            let path = clean_path(Path::new(&value));
            if let Some(found) = accept_candidate(&path) {
                info!(path = %found.display(), "Found Spine via {}", SPINE_PATH_VAR);
                return Ok(ExecutableLocation::new(
                    found,
                    DiscoveryMethod::EnvironmentVariable,
                ));
            }
            debug!(value = %path.display(), "{} does not point to Spine", SPINE_PATH_VAR);
        }

        Err(DiscoveryError::NotFound {
            var: SPINE_PATH_VAR.to_string(),
        })
    }
}

/// Run `<exe> --version` and extract the version line.
///
/// Returns the first line mentioning "version" (case-insensitive), else the
/// first non-empty line. Any failure or timeout yields `None`.
pub async fn probe_version(executable: &Path, timeout: Duration) -> Option<String> {
    let mut cmd = Command::new(executable);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    cmd.creation_flags(crate::executor::CREATE_NO_WINDOW);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!(error = %e, "Version probe failed to run");
            return None;
        }
        Err(_) => {
            debug!(timeout_secs = timeout.as_secs(), "Version probe timed out");
            return None;
        }
    };

    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    text.push('\n');
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    extract_version_line(&text)
}

fn extract_version_line(text: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .find(|l| l.to_ascii_lowercase().contains("version"))
        .or_else(|| lines.first())
        .map(|l| l.to_string())
}
