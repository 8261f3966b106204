//! Input resolution: expands directories into the `.spine` projects they contain.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ConversionError;
use crate::models::is_project_file;

/// Expand input paths into project files.
///
/// Directories are scanned for `.spine` files (descending into
/// subdirectories when `recursive` is set); results per directory are sorted.
/// Any other path is passed through as-is so a missing file still produces a
/// failed job instead of disappearing from the report.
pub async fn resolve_project_inputs(
    inputs: &[PathBuf],
    recursive: bool,
) -> Result<Vec<PathBuf>, ConversionError> {
    let mut projects = Vec::new();

    for input in inputs {
        if tokio::fs::metadata(input)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            let found = scan_directory(input, recursive).await?;
            if found.is_empty() {
                warn!(dir = %input.display(), "No .spine projects found in directory");
            }
            projects.extend(found);
        } else {
            if !is_project_file(input) {
                warn!(path = %input.display(), "Input does not have a .spine extension");
            }
            projects.push(input.clone());
        }
    }

    debug!(count = projects.len(), "Resolved project inputs");
    Ok(projects)
}

async fn scan_directory(root: &Path, recursive: bool) -> Result<Vec<PathBuf>, ConversionError> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read directory, skipping");
                continue;
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if is_project_file(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}
