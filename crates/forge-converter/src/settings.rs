//! Export settings documents passed to Spine with `-e`.
//!
//! A document is an open-schema JSON object. Templates are copied field by
//! field with their original order and types; only `input`, `output` and the
//! atlas page limits are overridden per job.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::ConversionError;
use crate::models::{DataFormat, ExportOptions};

/// File name of the default template, looked up in `config/` next to the binary.
pub const DEFAULT_TEMPLATE_NAME: &str = "DefaultExportSettings.json";

const KEY_INPUT: &str = "input";
const KEY_OUTPUT: &str = "output";
const KEY_PACK_ATLAS: &str = "packAtlas";
const KEY_MAX_WIDTH: &str = "maxWidth";
const KEY_MAX_HEIGHT: &str = "maxHeight";

/// Where a document's content came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    /// The job's own settings file.
    Custom(PathBuf),
    /// The default template.
    Template(PathBuf),
    /// The built-in document.
    BuiltIn,
}

/// An export settings document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettingsDocument {
    fields: Map<String, Value>,
}

impl ExportSettingsDocument {
    /// Parse a document. Anything other than a JSON object is rejected.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim_start_matches('\u{feff}');
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) => Ok(Self { fields }),
            Ok(other) => Err(format!("expected a JSON object, found {}", type_name(&other))),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Read and parse a document from disk.
    pub fn load(path: &Path) -> Result<Self, ConversionError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConversionError::InvalidExportSettings {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        Self::parse(&text).map_err(|reason| ConversionError::InvalidExportSettings {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// The built-in document used when no template is available.
    ///
    /// Jobs with no data format are rejected before a document is built;
    /// such options fall back to the JSON exporter here.
    pub fn builtin(options: &ExportOptions) -> Self {
        let (class, extension, format) = match options.data_format() {
            Some(DataFormat::Binary) => ("export-binary", ".skel", "binary"),
            Some(DataFormat::Json) | None => ("export-json", ".json", "JSON"),
        };

        let pack_atlas = if options.pack_atlas {
            json!({
                "stripWhitespaceX": true,
                "stripWhitespaceY": true,
                "rotation": true,
                "alias": true,
                "ignoreBlankImages": false,
                "alphaThreshold": 3,
                "minWidth": 16,
                "minHeight": 16,
                "maxWidth": 2048,
                "maxHeight": 2048,
                "pot": false,
                "multipleOfFour": false,
                "square": false,
                "outputFormat": "png",
                "jpegQuality": 0.9,
                "premultiplyAlpha": options.premultiply_alpha,
                "bleed": true,
                "scale": [1],
                "scaleSuffix": [""],
                "scaleResampling": ["bicubic"],
                "paddingX": 2,
                "paddingY": 2,
                "edgePadding": true,
                "duplicatePadding": false,
                "filterMin": "Linear",
                "filterMag": "Linear",
                "wrapX": "ClampToEdge",
                "wrapY": "ClampToEdge",
                "format": "RGBA8888",
                "atlasExtension": ".atlas",
                "combineSubdirectories": false,
                "flattenPaths": false,
                "useIndexes": false,
                "debug": false,
                "fast": false,
                "limitMemory": true,
                "currentProject": true,
                "packing": "rectangles",
                "prettyPrint": false,
                "legacyOutput": false,
                "webp": null,
                "bleedIterations": 2,
                "ignore": false,
                "separator": "_",
                "silent": false
            })
        } else {
            Value::Null
        };

        let doc = json!({
            "class": class,
            "extension": extension,
            "format": format,
            "prettyPrint": false,
            "nonessential": true,
            "cleanUp": true,
            "packAtlas": pack_atlas,
            "packSource": "attachments",
            "packTarget": "perskeleton",
            "warnings": true,
            "version": null,
            "output": "",
            "forceAll": false,
            "input": "",
            "open": false
        });

        match doc {
            Value::Object(fields) => Self { fields },
            _ => Self { fields: Map::new() },
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a top-level field, keeping its position if it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Set a field inside a nested object field. Does nothing if `section`
    /// is absent or not an object.
    pub fn set_nested(&mut self, section: &str, key: &str, value: impl Into<Value>) -> bool {
        match self.fields.get_mut(section) {
            Some(Value::Object(inner)) => {
                inner.insert(key.to_string(), value.into());
                true
            }
            _ => false,
        }
    }

    /// Apply a job: force `input`/`output` and override atlas page limits.
    pub fn apply_job(&mut self, input: &Path, output: &Path, options: &ExportOptions) {
        self.set(KEY_INPUT, input.to_string_lossy().to_string());
        self.set(KEY_OUTPUT, output.to_string_lossy().to_string());

        if let Some(width) = options.max_width_override() {
            self.set_nested(KEY_PACK_ATLAS, KEY_MAX_WIDTH, width);
        }
        if let Some(height) = options.max_height_override() {
            self.set_nested(KEY_PACK_ATLAS, KEY_MAX_HEIGHT, height);
        }
    }

    /// Field names in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn to_json_string(&self) -> Result<String, ConversionError> {
        Ok(serde_json::to_string_pretty(&self.fields)?)
    }

    /// Serialize the document to `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), ConversionError> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Builds per-job export settings documents.
#[derive(Debug, Clone, Default)]
pub struct ExportSettingsBuilder {
    default_template: Option<PathBuf>,
}

impl ExportSettingsBuilder {
    /// Builder with an explicit default template path.
    pub fn new(default_template: Option<PathBuf>) -> Self {
        Self { default_template }
    }

    /// Default template location: `config/DefaultExportSettings.json` next to
    /// the given executable directory.
    pub fn template_next_to(dir: &Path) -> PathBuf {
        dir.join("config").join(DEFAULT_TEMPLATE_NAME)
    }

    /// Builder using the template next to the running binary, if it can be located.
    pub fn for_current_exe() -> Self {
        let template = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Self::template_next_to));
        Self::new(template)
    }

    /// Build the document for one job.
    ///
    /// Tries the custom settings file, then the default template, then the
    /// built-in document. Unreadable or malformed templates are skipped with a
    /// warning, so a broken custom file falls back to the default template
    /// rather than straight to the built-in document. `input`/`output` are
    /// always the given effective paths.
    pub fn build(
        &self,
        custom: Option<&Path>,
        input: &Path,
        output: &Path,
        options: &ExportOptions,
    ) -> (ExportSettingsDocument, SettingsSource) {
        let candidates = custom
            .map(|p| SettingsSource::Custom(p.to_path_buf()))
            .into_iter()
            .chain(
                self.default_template
                    .clone()
                    .map(SettingsSource::Template),
            );

        for source in candidates {
            let path = match &source {
                SettingsSource::Custom(p) | SettingsSource::Template(p) => p.clone(),
                SettingsSource::BuiltIn => continue,
            };

            if !path.is_file() {
                debug!(path = %path.display(), "Export settings file not present");
                continue;
            }

            match ExportSettingsDocument::load(&path) {
                Ok(mut doc) => {
                    doc.apply_job(input, output, options);
                    debug!(path = %path.display(), "Using export settings template");
                    return (doc, source);
                }
                Err(e) => {
                    warn!(error = %e, "Ignoring unusable export settings, falling back");
                }
            }
        }

        let mut doc = ExportSettingsDocument::builtin(options);
        doc.apply_job(input, output, options);
        (doc, SettingsSource::BuiltIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> (PathBuf, PathBuf) {
        (PathBuf::from("/art/hero.spine"), PathBuf::from("/out/hero"))
    }

    #[test]
    fn test_builtin_has_forced_paths() {
        let (input, output) = paths();
        let builder = ExportSettingsBuilder::new(None);
        let (doc, source) = builder.build(None, &input, &output, &ExportOptions::default());

        assert_eq!(source, SettingsSource::BuiltIn);
        assert_eq!(doc.get("input"), Some(&json!("/art/hero.spine")));
        assert_eq!(doc.get("output"), Some(&json!("/out/hero")));
        assert_eq!(doc.get("class"), Some(&json!("export-json")));
        assert_eq!(doc.get("packAtlas").and_then(|p| p.get("maxWidth")), Some(&json!(2048)));
    }

    #[test]
    fn test_builtin_binary_without_atlas() {
        let options = ExportOptions {
            export_binary: true,
            pack_atlas: false,
            ..Default::default()
        };
        let doc = ExportSettingsDocument::builtin(&options);
        assert_eq!(doc.get("class"), Some(&json!("export-binary")));
        assert_eq!(doc.get("extension"), Some(&json!(".skel")));
        assert_eq!(doc.get("packAtlas"), Some(&Value::Null));
    }

    #[test]
    fn test_builtin_json_off_selects_binary_exporter() {
        let options = ExportOptions {
            export_json: false,
            export_binary: true,
            ..Default::default()
        };
        let doc = ExportSettingsDocument::builtin(&options);
        assert_ne!(doc, ExportSettingsDocument::builtin(&ExportOptions::default()));
        assert_eq!(doc.get("format"), Some(&json!("binary")));
    }

    #[test]
    fn test_template_fields_pass_through_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let template = temp.path().join("custom.json");
        std::fs::write(
            &template,
            r#"{"class":"export-json","input":"C:/old.spine","customFlag":{"nested":[1,2]},
               "packAtlas":{"paddingX":4,"maxWidth":1024},"output":"C:/old"}"#,
        )
        .expect("write");

        let (input, output) = paths();
        let options = ExportOptions {
            max_width: Some(512),
            max_height: Some(256),
            ..Default::default()
        };
        let (doc, source) =
            ExportSettingsBuilder::new(None).build(Some(&template), &input, &output, &options);

        assert_eq!(source, SettingsSource::Custom(template));
        assert_eq!(
            doc.keys().collect::<Vec<_>>(),
            vec!["class", "input", "customFlag", "packAtlas", "output"]
        );
        assert_eq!(doc.get("input"), Some(&json!("/art/hero.spine")));
        assert_eq!(doc.get("customFlag"), Some(&json!({"nested": [1, 2]})));
        let atlas = doc.get("packAtlas").expect("packAtlas");
        assert_eq!(atlas["paddingX"], json!(4));
        assert_eq!(atlas["maxWidth"], json!(512));
        assert_eq!(atlas["maxHeight"], json!(256));
    }

    #[test]
    fn test_missing_input_output_are_added() {
        let mut doc = ExportSettingsDocument::parse(r#"{"class":"export-json"}"#).expect("parse");
        let (input, output) = paths();
        doc.apply_job(&input, &output, &ExportOptions::default());
        assert!(doc.get("input").is_some());
        assert!(doc.get("output").is_some());
        assert!(doc.get("packAtlas").is_none());
    }

    #[test]
    fn test_zero_dimensions_keep_template_values() {
        let mut doc =
            ExportSettingsDocument::parse(r#"{"packAtlas":{"maxWidth":1024}}"#).expect("parse");
        let options = ExportOptions {
            max_width: Some(0),
            ..Default::default()
        };
        let (input, output) = paths();
        doc.apply_job(&input, &output, &options);
        assert_eq!(doc.get("packAtlas").map(|p| &p["maxWidth"]), Some(&json!(1024)));
    }

    #[test]
    fn test_malformed_custom_falls_back_to_default_template() {
        let temp = tempfile::tempdir().expect("tempdir");
        let broken = temp.path().join("broken.json");
        std::fs::write(&broken, "{ not json").expect("write");
        let default = temp.path().join(DEFAULT_TEMPLATE_NAME);
        std::fs::write(&default, r#"{"class":"export-json","fromTemplate":true}"#).expect("write");

        let (input, output) = paths();
        let (doc, source) = ExportSettingsBuilder::new(Some(default.clone())).build(
            Some(&broken),
            &input,
            &output,
            &ExportOptions::default(),
        );
        assert_eq!(source, SettingsSource::Template(default));
        assert_eq!(doc.get("fromTemplate"), Some(&json!(true)));
    }

    #[test]
    fn test_non_object_template_rejected() {
        assert!(ExportSettingsDocument::parse("[1,2,3]").is_err());
        let (input, output) = paths();
        let temp = tempfile::tempdir().expect("tempdir");
        let arr = temp.path().join("array.json");
        std::fs::write(&arr, "[]").expect("write");
        let (_, source) = ExportSettingsBuilder::new(None).build(
            Some(&arr),
            &input,
            &output,
            &ExportOptions::default(),
        );
        assert_eq!(source, SettingsSource::BuiltIn);
    }

    #[test]
    fn test_write_to_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("settings.json");
        let (input, output) = paths();
        let (doc, _) =
            ExportSettingsBuilder::new(None).build(None, &input, &output, &ExportOptions::default());
        doc.write_to(&target).expect("write");
        let reloaded = ExportSettingsDocument::load(&target).expect("load");
        assert_eq!(reloaded, doc);
    }

    #[test]
    fn test_template_next_to() {
        assert_eq!(
            ExportSettingsBuilder::template_next_to(Path::new("/opt/spine-forge")),
            PathBuf::from("/opt/spine-forge/config/DefaultExportSettings.json")
        );
    }
}
