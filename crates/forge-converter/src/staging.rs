//! Per-job scratch space and the non-ASCII path shim.
//!
//! Spine's command line mangles non-ASCII paths on some platforms. When the
//! project or the output directory contains non-ASCII characters, the project
//! (and its atlas/image siblings) is copied into an ASCII-named scratch
//! directory and exported into a scratch output directory whose contents are
//! copied back afterwards.
//!
//! Every temporary a job creates lives under one [`JobScratch`] directory.
//! Cleanup runs explicitly at the end of the job and again from `Drop` if the
//! job unwound before reaching it.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConversionError;

/// Sibling extensions staged together with the project file.
pub const SIBLING_EXTENSIONS: &[&str] = &["atlas", "png", "jpg", "jpeg"];

const SCRATCH_PREFIX: &str = "spine_stage_";
const SETTINGS_FILE_NAME: &str = "export_settings.json";
const FALLBACK_STEM: &str = "project";

/// Scratch directory owned by a single job.
#[derive(Debug)]
pub struct JobScratch {
    root: PathBuf,
    removed: bool,
}

impl JobScratch {
    /// Create `spine_stage_<uuid>` under `temp_root`.
    pub async fn create(temp_root: &Path) -> Result<Self, ConversionError> {
        let root = temp_root.join(format!("{}{}", SCRATCH_PREFIX, Uuid::now_v7().simple()));
        tokio::fs::create_dir_all(&root).await?;
        if has_non_ascii(&root) {
            warn!(path = %root.display(), "Scratch directory path is not ASCII");
        }
        debug!(path = %root.display(), "Created job scratch directory");
        Ok(Self {
            root,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Where the export settings document for this job is written.
    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }

    /// Remove the scratch directory. Failures are logged and swallowed.
    pub async fn cleanup(mut self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.root).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.root.display(), error = %e, "Failed to clean up scratch directory");
            }
        }
        self.removed = true;
    }
}

impl Drop for JobScratch {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.root.display(), error = %e, "Failed to clean up scratch directory");
            }
        }
    }
}

/// Returns `true` if any character of the path is outside ASCII.
pub fn has_non_ascii(path: &Path) -> bool {
    !path.to_string_lossy().is_ascii()
}

/// Reduce a file stem to `[A-Za-z0-9._-]`, replacing everything else with `_`.
///
/// Falls back to `project` when nothing alphanumeric survives.
pub fn ascii_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().any(|c| c.is_ascii_alphanumeric()) {
        cleaned
    } else {
        FALLBACK_STEM.to_string()
    }
}

/// Effective paths for one job after staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPaths {
    /// Project file passed to Spine.
    pub input: PathBuf,
    /// Output directory passed to Spine.
    pub output: PathBuf,
    /// Stem of the staged project, when the input was staged.
    pub staged_stem: Option<String>,
    /// Whether the output directory is a scratch copy.
    pub output_staged: bool,
}

impl StagedPaths {
    pub fn input_staged(&self) -> bool {
        self.staged_stem.is_some()
    }

    pub fn any_staged(&self) -> bool {
        self.input_staged() || self.output_staged
    }
}

/// Stage the project and/or the output directory when their paths are not ASCII.
pub async fn stage_job(
    scratch: &JobScratch,
    source: &Path,
    output_dir: &Path,
) -> Result<StagedPaths, ConversionError> {
    let mut staged = StagedPaths {
        input: source.to_path_buf(),
        output: output_dir.to_path_buf(),
        staged_stem: None,
        output_staged: false,
    };

    if has_non_ascii(source) {
        let stem = ascii_stem(
            &source
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        let input_dir = scratch.path().join("input");
        tokio::fs::create_dir_all(&input_dir).await?;

        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| crate::models::PROJECT_EXTENSION.to_string());
        let staged_input = input_dir.join(format!("{stem}.{extension}"));
        tokio::fs::copy(source, &staged_input).await?;

        for ext in SIBLING_EXTENSIONS {
            let sibling = source.with_extension(ext);
            if tokio::fs::try_exists(&sibling).await.unwrap_or(false) {
                let target = input_dir.join(format!("{stem}.{ext}"));
                tokio::fs::copy(&sibling, &target).await?;
                debug!(from = %sibling.display(), to = %target.display(), "Staged sibling file");
            }
        }

        debug!(from = %source.display(), to = %staged_input.display(), "Staged project with ASCII path");
        staged.input = staged_input;
        staged.staged_stem = Some(stem);
    }

    if has_non_ascii(output_dir) {
        let staged_output = scratch.path().join("output");
        tokio::fs::create_dir_all(&staged_output).await?;
        debug!(real = %output_dir.display(), staged = %staged_output.display(), "Using ASCII staging output directory");
        staged.output = staged_output;
        staged.output_staged = true;
    }

    Ok(staged)
}

/// Copy a directory tree into `dst`, overwriting existing files.
///
/// Returns the number of files copied.
pub async fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<usize, ConversionError> {
    let mut copied = 0;
    let mut pending = vec![(src.to_path_buf(), dst.to_path_buf())];

    while let Some((from_dir, to_dir)) = pending.pop() {
        tokio::fs::create_dir_all(&to_dir).await?;
        let mut entries = tokio::fs::read_dir(&from_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let from = entry.path();
            let to = to_dir.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((from, to));
            } else {
                tokio::fs::copy(&from, &to).await?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_non_ascii() {
        assert!(has_non_ascii(Path::new("/art/英雄.spine")));
        assert!(has_non_ascii(Path::new("/ärt/hero.spine")));
        assert!(!has_non_ascii(Path::new("/art/hero 2.spine")));
    }

    #[test]
    fn test_ascii_stem() {
        assert_eq!(ascii_stem("hero"), "hero");
        assert_eq!(ascii_stem("hero 英雄"), "hero___");
        assert_eq!(ascii_stem("英雄"), "project");
        assert_eq!(ascii_stem(""), "project");
    }

    #[tokio::test]
    async fn test_scratch_cleanup_removes_everything() {
        let temp = tempfile::tempdir().expect("tempdir");
        let scratch = JobScratch::create(temp.path()).await.expect("scratch");
        let root = scratch.path().to_path_buf();
        std::fs::write(scratch.settings_path(), "{}").expect("write");
        assert!(root.starts_with(temp.path()));

        scratch.cleanup().await;
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_scratch_drop_removes_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = {
            let scratch = JobScratch::create(temp.path()).await.expect("scratch");
            std::fs::create_dir_all(scratch.path().join("output/images")).expect("mkdir");
            scratch.path().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_ascii_paths_are_not_staged() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("hero.spine");
        std::fs::write(&source, "project").expect("write");
        let out = temp.path().join("out");

        let scratch = JobScratch::create(temp.path()).await.expect("scratch");
        let staged = stage_job(&scratch, &source, &out).await.expect("stage");
        assert_eq!(staged.input, source);
        assert_eq!(staged.output, out);
        assert!(!staged.any_staged());
        scratch.cleanup().await;
    }

    #[tokio::test]
    async fn test_non_ascii_input_staged_with_siblings() {
        let temp = tempfile::tempdir().expect("tempdir");
        let art = temp.path().join("美术");
        std::fs::create_dir_all(&art).expect("mkdir");
        let source = art.join("英雄.spine");
        std::fs::write(&source, "project").expect("write");
        std::fs::write(art.join("英雄.atlas"), "atlas").expect("write");
        std::fs::write(art.join("英雄.png"), "png").expect("write");
        std::fs::write(art.join("other.png"), "png").expect("write");
        let out = art.join("导出");

        let scratch = JobScratch::create(temp.path()).await.expect("scratch");
        let staged = stage_job(&scratch, &source, &out).await.expect("stage");

        assert_eq!(staged.staged_stem.as_deref(), Some("project"));
        assert!(staged.output_staged);
        assert!(!has_non_ascii(&staged.input));
        assert_eq!(staged.input.file_name().and_then(|n| n.to_str()), Some("project.spine"));
        let input_dir = staged.input.parent().expect("parent");
        assert!(input_dir.join("project.atlas").is_file());
        assert!(input_dir.join("project.png").is_file());
        assert!(!input_dir.join("other.png").exists());
        assert!(staged.output.is_dir());

        scratch.cleanup().await;
    }

    #[tokio::test]
    async fn test_copy_dir_recursive_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        std::fs::create_dir_all(src.join("images/sub")).expect("mkdir");
        std::fs::write(src.join("hero.json"), "new").expect("write");
        std::fs::write(src.join("images/sub/a.png"), "png").expect("write");
        std::fs::create_dir_all(&dst).expect("mkdir");
        std::fs::write(dst.join("hero.json"), "old").expect("write");

        let copied = copy_dir_recursive(&src, &dst).await.expect("copy");
        assert_eq!(copied, 2);
        assert_eq!(std::fs::read_to_string(dst.join("hero.json")).expect("read"), "new");
        assert!(dst.join("images/sub/a.png").is_file());
    }
}
