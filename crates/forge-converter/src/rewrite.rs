//! Asset path rewriting for exported skeleton JSON.
//!
//! Spine embeds the absolute `images` and `audio` directories of the project
//! in the exported JSON. Runtimes expect them relative to the export, so the
//! first `images` value becomes `./images/` and the first `audio` value
//! becomes empty. The file keeps its original encoding and a `.backup` copy of
//! the original is written first.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::encoding::decode_text;
use crate::error::ConversionError;

/// Replacement for the `images` field.
pub const IMAGES_REPLACEMENT: &str = r#""images": "./images/""#;
/// Replacement for the `audio` field.
pub const AUDIO_REPLACEMENT: &str = r#""audio": """#;
/// Suffix appended to the backup copy.
pub const BACKUP_SUFFIX: &str = ".backup";

static IMAGES_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""images"\s*:\s*"[^"]*""#).expect("valid images regex")
});

static AUDIO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""audio"\s*:\s*"[^"]*""#).expect("valid audio regex")
});

/// Which fields to rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewriteOptions {
    pub reset_image_paths: bool,
    pub reset_audio_paths: bool,
}

impl RewriteOptions {
    pub fn any(&self) -> bool {
        self.reset_image_paths || self.reset_audio_paths
    }
}

/// Outcome of a rewrite pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteReport {
    /// The rewritten file.
    pub path: PathBuf,
    /// Fields that were actually replaced (`images`, `audio`).
    pub rewritten: Vec<String>,
    /// Requested fields that were not present.
    pub missing: Vec<String>,
    /// Backup of the original, when the file was changed.
    pub backup: Option<PathBuf>,
    /// Detected encoding name.
    pub encoding: String,
}

impl RewriteReport {
    pub fn changed(&self) -> bool {
        !self.rewritten.is_empty()
    }
}

/// Replace the first match of `pattern`, reporting whether anything matched.
fn replace_first(text: &str, pattern: &Regex, replacement: &str) -> Option<String> {
    if !pattern.is_match(text) {
        return None;
    }
    Some(pattern.replacen(text, 1, regex::NoExpand(replacement)).into_owned())
}

/// Apply the requested replacements to decoded text.
///
/// Returns the new text and the names of the fields that were replaced and
/// missing, in that order.
pub fn rewrite_text(text: &str, options: RewriteOptions) -> (String, Vec<String>, Vec<String>) {
    let mut current = text.to_string();
    let mut rewritten = Vec::new();
    let mut missing = Vec::new();

    let passes = [
        (options.reset_image_paths, "images", &*IMAGES_PATTERN, IMAGES_REPLACEMENT),
        (options.reset_audio_paths, "audio", &*AUDIO_PATTERN, AUDIO_REPLACEMENT),
    ];

    for (enabled, field, pattern, replacement) in passes {
        if !enabled {
            continue;
        }
        match replace_first(&current, pattern, replacement) {
            Some(next) => {
                current = next;
                rewritten.push(field.to_string());
            }
            None => missing.push(field.to_string()),
        }
    }

    (current, rewritten, missing)
}

/// Rewrite asset paths in an exported JSON file in place.
///
/// The original is copied to `<file>.backup` before it is overwritten. If no
/// requested field is present the file is left untouched and no backup is made.
pub fn rewrite_asset_paths(
    json_path: &Path,
    options: RewriteOptions,
) -> Result<RewriteReport, ConversionError> {
    let bytes = std::fs::read(json_path)?;
    let (text, encoding) =
        decode_text(&bytes).map_err(|e| ConversionError::PostProcessingFailed {
            path: json_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let (updated, rewritten, missing) = rewrite_text(&text, options);

    for field in &missing {
        info!(path = %json_path.display(), field = %field, "Field not present, nothing to rewrite");
    }

    let mut report = RewriteReport {
        path: json_path.to_path_buf(),
        rewritten,
        missing,
        backup: None,
        encoding: encoding.to_string(),
    };

    if !report.changed() {
        return Ok(report);
    }

    let backup = backup_path(json_path);
    std::fs::copy(json_path, &backup)?;
    std::fs::write(json_path, encoding.encode(&updated))?;

    debug!(
        path = %json_path.display(),
        backup = %backup.display(),
        encoding = %encoding,
        fields = ?report.rewritten,
        "Rewrote asset paths"
    );
    report.backup = Some(backup);
    Ok(report)
}

/// `<file>.backup` next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Locate the exported JSON for a project stem, trying each stem in order.
///
/// Logs the directory listing when nothing matches.
pub fn find_exported_json(output_dir: &Path, stems: &[&str]) -> Option<PathBuf> {
    for stem in stems {
        let candidate = output_dir.join(format!("{stem}.json"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let listing: Vec<String> = std::fs::read_dir(output_dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    warn!(
        dir = %output_dir.display(),
        expected = ?stems,
        files = ?listing,
        "Exported JSON not found, skipping path rewrite"
    );
    None
}
