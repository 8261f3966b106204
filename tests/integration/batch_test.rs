#![cfg(unix)]

mod helpers;

use forge_converter::models::{ConversionJob, FailureReason};
use tokio_util::sync::CancellationToken;

use helpers::Fixture;

#[tokio::test]
async fn test_failed_job_does_not_stop_batch() {
    let fx = Fixture::new();
    let out = fx.root().join("export");
    let jobs: Vec<ConversionJob> = ["alpha.spine", "bad_beta.spine", "gamma.spine"]
        .iter()
        .map(|name| ConversionJob::new(fx.project(name), &out))
        .collect();

    let processor = fx.processor();
    let report = processor
        .convert_batch(&jobs, &CancellationToken::new())
        .await;

    assert_eq!(report.total(), 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert!(!report.all_succeeded());

    let statuses: Vec<bool> = report.results.iter().map(|r| r.success).collect();
    assert_eq!(statuses, vec![true, false, true]);
    assert_eq!(
        report.results[1].failure,
        Some(FailureReason::NonZeroExit { code: 2 })
    );

    assert!(out.join("alpha.json").is_file());
    assert!(out.join("gamma.json").is_file());
    assert!(!out.join("bad_beta.json").exists());

    assert_eq!(report.metrics.jobs_started, 3);
    assert_eq!(report.metrics.jobs_succeeded, 2);
    assert_eq!(report.metrics.jobs_failed, 1);
    assert_eq!(report.metrics.json_rewrites, 2);
    assert_eq!(fx.scratch_entries(), 0);
}

#[tokio::test]
async fn test_missing_input_is_reported_in_order() {
    let fx = Fixture::new();
    let out = fx.root().join("export");
    let jobs = vec![
        ConversionJob::new(fx.root().join("missing.spine"), &out),
        ConversionJob::new(fx.project("hero.spine"), &out),
    ];

    let report = fx
        .processor()
        .convert_batch(&jobs, &CancellationToken::new())
        .await;

    assert_eq!(
        report.results[0].failure,
        Some(FailureReason::InputFileNotFound)
    );
    assert!(report.results[1].success);
    assert_eq!(report.results[1].source, jobs[1].source);
}
