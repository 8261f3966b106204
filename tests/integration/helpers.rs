//! Shared fixtures: a fake Spine executable and an isolated processor.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use forge_converter::discovery::NoRegistry;
use forge_converter::{ConversionProcessor, ExecutableDiscovery};
use forge_core::config::ConverterConfig;

/// Fake Spine CLI.
///
/// Parses `-i/-o/-e`, then writes `<stem>.json`, `.atlas` and `.png` into the
/// output directory. Projects whose name contains `bad` exit with code 2 and
/// projects containing `slow` never finish.
const FAKE_SPINE: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    -i) input="$2"; shift 2 ;;
    -o) output="$2"; shift 2 ;;
    -e) settings="$2"; shift 2 ;;
    *) shift ;;
  esac
done
[ -f "$settings" ] || { echo "missing settings" >&2; exit 9; }
name=$(basename "$input")
stem="${name%.*}"
case "$stem" in
  *bad*) echo "Unable to open project: $stem" >&2; exit 2 ;;
  *slow*) exec sleep 30 ;;
esac
mkdir -p "$output"
echo "Exporting $stem"
printf '{"skeleton":{"hash":"abc","spine":"4.1.24","images":"C:/art/%s/images/","audio":"C:/art/%s/audio"},"bones":[{"name":"root"}]}' "$stem" "$stem" > "$output/$stem.json"
printf '%s.png\nsize: 64,64\n' "$stem" > "$output/$stem.atlas"
printf 'PNG' > "$output/$stem.png"
echo "Export complete"
"#;

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub spine: PathBuf,
    pub temp_root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).expect("mkdir bin");
        let spine = bin.join("spine");
        std::fs::write(&spine, FAKE_SPINE).expect("write fake spine");
        std::fs::set_permissions(&spine, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let temp_root = dir.path().join("scratch");
        std::fs::create_dir_all(&temp_root).expect("mkdir scratch");

        Self {
            dir,
            spine,
            temp_root,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create a project file (plus an atlas sibling) under `rel`.
    pub fn project(&self, rel: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir project dir");
        }
        std::fs::write(&path, b"spine-project").expect("write project");
        std::fs::write(path.with_extension("atlas"), b"atlas").expect("write sibling");
        path
    }

    pub fn config(&self) -> ConverterConfig {
        ConverterConfig {
            spine_path: Some(self.spine.clone()),
            temp_root: Some(self.temp_root.clone()),
            ..Default::default()
        }
    }

    pub fn processor(&self) -> ConversionProcessor {
        ConversionProcessor::new(self.config())
            .with_discovery(
                ExecutableDiscovery::new()
                    .with_registry(NoRegistry)
                    .with_common_dirs(Vec::new()),
            )
            .with_timeout(Duration::from_secs(10))
    }

    /// Entries left in the scratch root.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(&self.temp_root)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
