//! Verification Integration Tests
//!
//! Sync-diff reports are collected into per-task logs and counted.

mod common;

use std::sync::Arc;

use altaget::core::verify::verify_log_path;
use altaget::core::{ArchivePolicy, PathResolver, TransferSettings};
use altaget::domain::EventType;
use altaget::report::MemoryReporter;
use altaget::{ObservationDate, TransferBatch, VerificationPass};
use tempfile::TempDir;
use uuid::Uuid;

use common::FakeDiff;
use common::FakeProbe;

const COLD: &str = "/altaZone/archive/apertif_main/visibilities_default";

fn cold(task_id: u32, beam_id: u32) -> String {
    format!(
        "{}/181205{:03}/WSRTA181205{:03}_B{:03}.MS",
        COLD, task_id, task_id, beam_id
    )
}

fn batch() -> TransferBatch {
    TransferBatch {
        date: ObservationDate::new(181205).unwrap(),
        task_ids: vec![4, 5],
        beams: vec![0, 1],
        force_legacy: false,
    }
}

#[tokio::test]
async fn test_failed_files_counted_per_task() {
    let temp = TempDir::new().unwrap();
    let tmp_dir = temp.path().join("tmp");
    let (b0, b1) = (cold(4, 0), cold(4, 1));
    let differ = Arc::new(FakeDiff::with_reports(&[
        (b0.as_str(), "N  table.f1  1024  N\nN  table.f2  2048  N\n"),
        (b1.as_str(), "N  table.f7  512  N\n"),
    ]));
    let reporter = Arc::new(MemoryReporter::new());

    let pass = VerificationPass::new(
        Uuid::new_v4(),
        Arc::new(PathResolver::new(
            ArchivePolicy::default(),
            Arc::new(FakeProbe::default()),
        )),
        differ.clone(),
        reporter.clone(),
        TransferSettings {
            target_dir: temp.path().join("data"),
            tmp_dir: tmp_dir.clone(),
            retries: 5,
        },
    );

    let report = pass.run(&batch()).await.unwrap();

    assert_eq!(report.tasks.len(), 2);
    assert_eq!(report.tasks[0].task_id, 4);
    assert_eq!(report.tasks[0].failed_files, 3);
    assert_eq!(report.tasks[1].task_id, 5);
    assert_eq!(report.tasks[1].failed_files, 0);
    assert_eq!(report.total_failed(), 3);

    // Beam-major order, local side is the transfer target
    let calls = differ.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[1].0, cold(5, 0));
    assert!(calls[1].1.ends_with("WSRTA181205005_B000.MS"));

    let log = verify_log_path(&tmp_dir, ObservationDate::new(181205).unwrap(), 4);
    assert_eq!(std::fs::read_to_string(log).unwrap().lines().count(), 3);

    let summaries: Vec<Option<u64>> = reporter
        .events()
        .iter()
        .filter(|e| e.event_type == EventType::VerificationSummary)
        .map(|e| e.failed_files)
        .collect();
    assert_eq!(summaries, vec![Some(3), Some(0)]);
}

#[tokio::test]
async fn test_logs_reset_between_runs() {
    let temp = TempDir::new().unwrap();
    let tmp_dir = temp.path().join("tmp");
    let b0 = cold(4, 0);
    let differ = Arc::new(FakeDiff::with_reports(&[(
        b0.as_str(),
        "N  table.f1  1024  N\n",
    )]));

    let pass = VerificationPass::new(
        Uuid::new_v4(),
        Arc::new(PathResolver::new(
            ArchivePolicy::default(),
            Arc::new(FakeProbe::default()),
        )),
        differ,
        Arc::new(MemoryReporter::new()),
        TransferSettings {
            target_dir: temp.path().join("data"),
            tmp_dir,
            retries: 5,
        },
    );

    let first = pass.run(&batch()).await.unwrap();
    let second = pass.run(&batch()).await.unwrap();
    assert_eq!(first.tasks[0].failed_files, 1);
    assert_eq!(second.tasks[0].failed_files, 1);
}

#[tokio::test]
async fn test_custom_marker() {
    let temp = TempDir::new().unwrap();
    let b0 = cold(4, 0);
    let differ = Arc::new(FakeDiff::with_reports(&[(
        b0.as_str(),
        "X table.f1\nN table.f2\n",
    )]));

    let pass = VerificationPass::new(
        Uuid::new_v4(),
        Arc::new(PathResolver::new(
            ArchivePolicy::default(),
            Arc::new(FakeProbe::default()),
        )),
        differ,
        Arc::new(MemoryReporter::new()),
        TransferSettings {
            target_dir: temp.path().join("data"),
            tmp_dir: temp.path().join("tmp"),
            retries: 5,
        },
    )
    .with_marker('X');

    let report = pass.run(&batch()).await.unwrap();
    assert_eq!(report.tasks[0].failed_files, 1);
}

#[tokio::test]
async fn test_staged_items_compare_against_tarball() {
    let temp = TempDir::new().unwrap();
    let differ = Arc::new(FakeDiff::default());

    let pass = VerificationPass::new(
        Uuid::new_v4(),
        Arc::new(PathResolver::new(
            ArchivePolicy::default(),
            Arc::new(FakeProbe::all_staged()),
        )),
        differ.clone(),
        Arc::new(MemoryReporter::new()),
        TransferSettings {
            target_dir: temp.path().join("data"),
            tmp_dir: temp.path().join("tmp"),
            retries: 5,
        },
    );

    pass.run(&batch()).await.unwrap();

    let calls = differ.calls();
    assert!(calls[0].0.ends_with("/181205004/WSRTA181205004_B000.MS.tar"));
    assert!(calls[0].1.ends_with("WSRTA181205004_B000.MS"));
}
