//! Post-transfer verification.
//!
//! Runs the sync-diff tool in report-only mode for every transferred dataset
//! and counts the lines it flags as differing. Purely advisory: nothing is
//! re-copied.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::adapters::SyncDiff;
use crate::domain::{EventType, ObservationDate, TransferEvent};
use crate::report::Reporter;

use super::error::FetchError;
use super::orchestrator::{TransferBatch, TransferSettings};
use super::resolver::PathResolver;

/// Character `irsync -l` puts on lines that need updating
pub const DEFAULT_MISMATCH_MARKER: char = 'N';

/// Failed-file count for one task id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskVerification {
    pub task_id: u32,
    pub failed_files: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub tasks: Vec<TaskVerification>,
}

impl VerificationReport {
    pub fn total_failed(&self) -> u64 {
        self.tasks.iter().map(|t| t.failed_files).sum()
    }
}

/// Per-task log the sync-diff output is appended to
pub fn verify_log_path(tmp_dir: &Path, date: ObservationDate, task_id: u32) -> PathBuf {
    tmp_dir.join(format!("transfer_WSRTA{}{:03}_to_alta_verify.log", date, task_id))
}

/// Number of lines in `log` containing `marker`
pub fn count_marked_lines(log: &str, marker: char) -> u64 {
    log.lines().filter(|line| line.contains(marker)).count() as u64
}

pub struct VerificationPass {
    run_id: Uuid,
    resolver: Arc<PathResolver>,
    differ: Arc<dyn SyncDiff>,
    reporter: Arc<dyn Reporter>,
    settings: TransferSettings,
    marker: char,
}

impl VerificationPass {
    pub fn new(
        run_id: Uuid,
        resolver: Arc<PathResolver>,
        differ: Arc<dyn SyncDiff>,
        reporter: Arc<dyn Reporter>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            run_id,
            resolver,
            differ,
            reporter,
            settings,
            marker: DEFAULT_MISMATCH_MARKER,
        }
    }

    pub fn with_marker(mut self, marker: char) -> Self {
        self.marker = marker;
        self
    }

    /// Diff every dataset of the batch, then count failures per task id.
    ///
    /// The remote side is whatever the resolver returns. For staged items that
    /// is the `.MS.tar` tarball, which never matches the extracted local
    /// directory, so those items always contribute failed-file lines.
    #[instrument(skip(self, batch), fields(run_id = %self.run_id, date = %batch.date))]
    pub async fn run(&self, batch: &TransferBatch) -> Result<VerificationReport, FetchError> {
        let tmp_dir = &self.settings.tmp_dir;
        fs::create_dir_all(tmp_dir)
            .await
            .map_err(|e| FetchError::io(format!("Failed to create {}", tmp_dir.display()), e))?;

        for &task_id in &batch.task_ids {
            let log = verify_log_path(tmp_dir, batch.date, task_id);
            fs::write(&log, b"")
                .await
                .map_err(|e| FetchError::io(format!("Failed to reset {}", log.display()), e))?;
        }

        for key in batch.keys() {
            let location = self.resolver.resolve(&key, batch.force_legacy).await?;
            let local = self.settings.target_for(&key);
            let report = self.differ.diff(&location.path, &local).await?;

            let log = verify_log_path(tmp_dir, batch.date, key.task_id);
            append(&log, &report).await?;

            self.emit(TransferEvent::new(
                self.run_id,
                Some(key),
                EventType::Verified,
                format!("Compared {} with {}", location.path, local.display()),
            ))
            .await;
        }

        let mut report = VerificationReport::default();
        let mut seen = Vec::new();
        for &task_id in &batch.task_ids {
            if seen.contains(&task_id) {
                continue;
            }
            seen.push(task_id);

            let log = verify_log_path(tmp_dir, batch.date, task_id);
            let content = fs::read_to_string(&log)
                .await
                .map_err(|e| FetchError::io(format!("Failed to read {}", log.display()), e))?;
            let failed_files = count_marked_lines(&content, self.marker);

            self.emit(
                TransferEvent::new(
                    self.run_id,
                    None,
                    EventType::VerificationSummary,
                    format!(
                        "Number of failed files for task ID {:03}: {}",
                        task_id, failed_files
                    ),
                )
                .with_failed_files(failed_files),
            )
            .await;
            report.tasks.push(TaskVerification {
                task_id,
                failed_files,
            });
        }

        Ok(report)
    }

    async fn emit(&self, event: TransferEvent) {
        if let Err(e) = self.reporter.record(&event).await {
            warn!(error = %e, "Failed to record verification event");
        }
    }
}

async fn append(path: &Path, content: &str) -> Result<(), FetchError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| FetchError::io(format!("Failed to open {}", path.display()), e))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(|e| FetchError::io(format!("Failed to append to {}", path.display()), e))?;
    file.flush()
        .await
        .map_err(|e| FetchError::io(format!("Failed to flush {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_marked_lines() {
        let log = "N   /local/a.MS/table.f1   1024   N\n\
                   /local/a.MS/table.f2 ok\n\
                   N /local/a.MS/table.f3\n";
        assert_eq!(count_marked_lines(log, 'N'), 2);
        assert_eq!(count_marked_lines("", 'N'), 0);
    }

    #[test]
    fn test_verify_log_path() {
        let date = ObservationDate::new(180316).unwrap();
        assert_eq!(
            verify_log_path(Path::new("tmp"), date, 4),
            PathBuf::from("tmp/transfer_WSRTA180316004_to_alta_verify.log")
        );
    }

    #[test]
    fn test_total_failed() {
        let report = VerificationReport {
            tasks: vec![
                TaskVerification {
                    task_id: 1,
                    failed_files: 2,
                },
                TaskVerification {
                    task_id: 2,
                    failed_files: 3,
                },
            ],
        };
        assert_eq!(report.total_failed(), 5);
    }
}
