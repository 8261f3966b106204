#![cfg(unix)]

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use forge_converter::models::{ConversionJob, ExportOptions, FailureReason};
use forge_converter::observer::{OutputStream, RecordingObserver};
use tokio_util::sync::CancellationToken;

use helpers::Fixture;

#[tokio::test]
async fn test_export_rewrites_asset_paths_and_keeps_backup() {
    let fx = Fixture::new();
    let source = fx.project("art/hero.spine");
    let out = fx.root().join("export");
    let observer = Arc::new(RecordingObserver::default());
    let processor = fx.processor().with_observer(observer.clone());

    let result = processor
        .convert_job(&ConversionJob::new(&source, &out), &CancellationToken::new())
        .await;

    assert!(result.success, "export failed: {:?}", result.error);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.rewritten_fields, vec!["images", "audio"]);
    assert_eq!(result.produced_files.len(), 3);
    assert!(result.stdout.iter().any(|l| l == "Export complete"));

    let json = std::fs::read_to_string(out.join("hero.json")).expect("read json");
    assert!(json.contains(r#""images": "./images/""#));
    assert!(json.contains(r#""audio": """#));
    assert!(json.contains(r#""bones":[{"name":"root"}]"#));

    let backup = std::fs::read_to_string(out.join("hero.json.backup")).expect("read backup");
    assert!(backup.contains("C:/art/hero/images/"));

    assert!(
        observer
            .lines(OutputStream::Stdout)
            .contains(&"Exporting hero".to_string())
    );
    assert_eq!(fx.scratch_entries(), 0);
}

#[tokio::test]
async fn test_keep_paths_leaves_json_untouched() {
    let fx = Fixture::new();
    let source = fx.project("hero.spine");
    let out = fx.root().join("export");
    let options = ExportOptions {
        reset_image_paths: false,
        reset_audio_paths: false,
        ..Default::default()
    };

    let result = fx
        .processor()
        .convert_job(
            &ConversionJob::new(&source, &out).with_options(options),
            &CancellationToken::new(),
        )
        .await;

    assert!(result.success);
    assert!(result.rewritten_fields.is_empty());
    assert!(!out.join("hero.json.backup").exists());
}

#[tokio::test]
async fn test_nonzero_exit_reports_stderr() {
    let fx = Fixture::new();
    let source = fx.project("bad_rig.spine");
    let out = fx.root().join("export");

    let result = fx
        .processor()
        .convert_job(&ConversionJob::new(&source, &out), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureReason::NonZeroExit { code: 2 }));
    assert_eq!(result.exit_code, Some(2));
    assert_eq!(result.stderr, vec!["Unable to open project: bad_rig"]);
    assert!(result.error.as_deref().unwrap_or_default().contains("Unable to open project"));
    assert_eq!(fx.scratch_entries(), 0);
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let fx = Fixture::new();
    let source = fx.project("slow.spine");
    let processor = fx.processor().with_timeout(Duration::from_millis(300));

    let started = std::time::Instant::now();
    let result = processor
        .convert_job(
            &ConversionJob::new(&source, fx.root().join("export")),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.failure, Some(FailureReason::Timeout));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(processor.metrics().snapshot().jobs_timed_out, 1);
    assert_eq!(fx.scratch_entries(), 0);
}

#[tokio::test]
async fn test_cancellation_stops_running_export() {
    let fx = Fixture::new();
    let source = fx.project("slow.spine");
    let processor = fx.processor();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let result = processor
        .convert_job(&ConversionJob::new(&source, fx.root().join("export")), &cancel)
        .await;

    assert_eq!(result.failure, Some(FailureReason::Cancelled));
    assert_eq!(fx.scratch_entries(), 0);
}

#[tokio::test]
async fn test_non_ascii_paths_are_staged() {
    let fx = Fixture::new();
    let source = fx.project("プロジェクト/勇者.spine");
    let out = fx.root().join("出力");

    let processor = fx.processor();
    let result = processor
        .convert_job(&ConversionJob::new(&source, &out), &CancellationToken::new())
        .await;

    assert!(result.success, "export failed: {:?}", result.error);
    // The fake CLI names outputs after the staged ASCII stem.
    assert!(out.join("project.json").is_file());
    assert!(out.join("project.atlas").is_file());
    assert_eq!(result.rewritten_fields, vec!["images", "audio"]);
    assert_eq!(processor.metrics().snapshot().jobs_staged, 1);
    assert_eq!(fx.scratch_entries(), 0);
}

#[tokio::test]
async fn test_custom_settings_file_is_used() {
    let fx = Fixture::new();
    let source = fx.project("hero.spine");
    let custom = fx.root().join("custom.json");
    std::fs::write(&custom, r#"{"class":"export-json","extension":".json","prettyPrint":true}"#)
        .expect("write settings");

    let result = fx
        .processor()
        .convert_job(
            &ConversionJob::new(&source, fx.root().join("export")).with_export_settings(&custom),
            &CancellationToken::new(),
        )
        .await;

    assert!(result.success, "export failed: {:?}", result.error);
    // The user's file is read, never modified.
    let untouched = std::fs::read_to_string(&custom).expect("read settings");
    assert!(!untouched.contains("input"));
}
