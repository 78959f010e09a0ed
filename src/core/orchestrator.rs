//! Transfer orchestration.
//!
//! Walks the beam × task-id cross product in beam-major order, resolves each
//! dataset, copies it with the bulk-copy tool and unpacks staged tarballs into
//! the requested target. Items run strictly one after another and the first
//! failure aborts the batch, leaving restart checkpoints behind for a re-run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glob::Pattern;
use tokio::fs;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::adapters::{BulkCopy, CopyRequest, Extractor};
use crate::domain::{ArchiveLocation, EventType, ObservationDate, ObservationKey, TransferEvent};
use crate::report::Reporter;

use super::error::FetchError;
use super::resolver::PathResolver;

/// Retry budget handed to the copy tool when none is configured
pub const DEFAULT_RETRIES: u32 = 5;

/// Suffix shared by all restart-checkpoint files
pub const CHECKPOINT_SUFFIX: &str = "irods-status";

/// Where transfers land and where temporary files go
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub target_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub retries: u32,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("."),
            tmp_dir: PathBuf::from("."),
            retries: DEFAULT_RETRIES,
        }
    }
}

impl TransferSettings {
    /// Local directory a dataset is copied to
    pub fn target_for(&self, key: &ObservationKey) -> PathBuf {
        self.target_dir.join(key.dataset_name())
    }

    /// The pair of restart-checkpoint files used for `key`
    pub fn checkpoints_for(&self, key: &ObservationKey) -> (PathBuf, PathBuf) {
        let stem = key.checkpoint_stem();
        (
            self.tmp_dir.join(format!("{}.{}", stem, CHECKPOINT_SUFFIX)),
            self.tmp_dir.join(format!("{}.lf-{}", stem, CHECKPOINT_SUFFIX)),
        )
    }
}

/// One observation's worth of beams and task ids
#[derive(Debug, Clone)]
pub struct TransferBatch {
    pub date: ObservationDate,
    pub task_ids: Vec<u32>,
    pub beams: Vec<u32>,
    /// Force the three-digit online layout regardless of date
    pub force_legacy: bool,
}

impl TransferBatch {
    /// Keys in processing order: beam-major, task-id-minor
    pub fn keys(&self) -> impl Iterator<Item = ObservationKey> + '_ {
        self.beams.iter().flat_map(move |&beam| {
            self.task_ids
                .iter()
                .map(move |&task| ObservationKey::new(self.date, task, beam))
        })
    }
}

/// Outcome of a completed batch
#[derive(Debug, Clone, Default)]
pub struct TransferSummary {
    pub transferred: usize,
    pub directories: usize,
    pub tarballs: usize,
    pub checkpoints_removed: usize,
    pub elapsed: Duration,
}

/// Drives resolution, copying and unpacking for a batch
pub struct TransferOrchestrator {
    run_id: Uuid,
    resolver: Arc<PathResolver>,
    copier: Arc<dyn BulkCopy>,
    extractor: Arc<dyn Extractor>,
    reporter: Arc<dyn Reporter>,
    settings: TransferSettings,
}

impl TransferOrchestrator {
    pub fn new(
        resolver: Arc<PathResolver>,
        copier: Arc<dyn BulkCopy>,
        extractor: Arc<dyn Extractor>,
        reporter: Arc<dyn Reporter>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            resolver,
            copier,
            extractor,
            reporter,
            settings,
        }
    }

    /// Use an externally chosen run id, e.g. one already naming an event log
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Identifier attached to every event of this invocation
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Transfer every dataset in the batch, then sweep checkpoint files
    #[instrument(skip(self, batch), fields(run_id = %self.run_id, date = %batch.date))]
    pub async fn run(&self, batch: &TransferBatch) -> Result<TransferSummary, FetchError> {
        let started = Instant::now();
        self.emit(TransferEvent::new(
            self.run_id,
            None,
            EventType::BatchStarted,
            format!(
                "Fetching {} beam(s) x {} task id(s) for {}",
                batch.beams.len(),
                batch.task_ids.len(),
                batch.date
            ),
        ))
        .await;

        match self.transfer_all(batch).await {
            Ok(mut summary) => {
                summary.checkpoints_removed = sweep_checkpoints(&self.settings.tmp_dir).await?;
                self.emit(
                    TransferEvent::new(
                        self.run_id,
                        None,
                        EventType::CheckpointsSwept,
                        format!("Removed {} checkpoint file(s)", summary.checkpoints_removed),
                    ),
                )
                .await;

                summary.elapsed = started.elapsed();
                self.emit(
                    TransferEvent::new(
                        self.run_id,
                        None,
                        EventType::BatchCompleted,
                        format!(
                            "Transferred {} dataset(s) in {:.2} min",
                            summary.transferred,
                            summary.elapsed.as_secs_f64() / 60.0
                        ),
                    )
                    .with_duration(summary.elapsed.as_millis() as u64),
                )
                .await;
                Ok(summary)
            }
            Err(e) => {
                self.emit(
                    TransferEvent::new(self.run_id, None, EventType::BatchFailed, "Transfer aborted")
                        .with_duration(started.elapsed().as_millis() as u64)
                        .with_error(e.to_string()),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn transfer_all(&self, batch: &TransferBatch) -> Result<TransferSummary, FetchError> {
        for dir in [&self.settings.target_dir, &self.settings.tmp_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| FetchError::io(format!("Failed to create {}", dir.display()), e))?;
        }

        let mut summary = TransferSummary::default();
        for key in batch.keys() {
            let target = self.settings.target_for(&key);
            let location = self.fetch_one(&key, &target, batch.force_legacy).await?;
            summary.transferred += 1;
            if location.is_tarball() {
                summary.tarballs += 1;
            } else {
                summary.directories += 1;
            }
        }
        Ok(summary)
    }

    /// Resolve every key without copying anything
    pub async fn plan(
        &self,
        batch: &TransferBatch,
    ) -> Result<Vec<(ObservationKey, ArchiveLocation)>, FetchError> {
        let mut planned = Vec::new();
        for key in batch.keys() {
            let location = self.resolve(&key, batch.force_legacy).await?;
            planned.push((key, location));
        }
        Ok(planned)
    }

    async fn resolve(
        &self,
        key: &ObservationKey,
        force_legacy: bool,
    ) -> Result<ArchiveLocation, FetchError> {
        let location = self.resolver.resolve(key, force_legacy).await?;
        self.emit(
            TransferEvent::new(
                self.run_id,
                Some(*key),
                EventType::Resolved,
                format!("{} is in the {} tier", key, location.tier),
            )
            .with_location(location.clone()),
        )
        .await;
        Ok(location)
    }

    /// Fetch a single dataset so that it ends up at exactly `target`
    pub async fn fetch_one(
        &self,
        key: &ObservationKey,
        target: &Path,
        force_legacy: bool,
    ) -> Result<ArchiveLocation, FetchError> {
        let location = self.resolve(key, force_legacy).await?;

        let destination = if location.is_tarball() {
            tarball_path(target)
        } else {
            target.to_path_buf()
        };
        let (checkpoint, lf_checkpoint) = self.settings.checkpoints_for(key);
        let request = CopyRequest {
            source: location.path.clone(),
            destination,
            checkpoint,
            lf_checkpoint,
            retries: self.settings.retries,
        };

        self.emit(TransferEvent::new(
            self.run_id,
            Some(*key),
            EventType::CopyStarted,
            format!("Copying {} to {}", request.source, request.destination.display()),
        ))
        .await;
        let copy_started = Instant::now();
        self.copier.copy(&request).await?;
        self.emit(
            TransferEvent::new(
                self.run_id,
                Some(*key),
                EventType::CopyCompleted,
                format!("Copied {}", key),
            )
            .with_duration(copy_started.elapsed().as_millis() as u64),
        )
        .await;

        if location.is_tarball() {
            self.unpack_tarball(key, &request.destination, target).await?;
            self.emit(TransferEvent::new(
                self.run_id,
                Some(*key),
                EventType::Extracted,
                format!("Unpacked {} into {}", key, target.display()),
            ))
            .await;
        }

        Ok(location)
    }

    /// Extract `tarball` next to `target`, move its single dataset into place
    /// and delete the tarball.
    async fn unpack_tarball(
        &self,
        key: &ObservationKey,
        tarball: &Path,
        target: &Path,
    ) -> Result<(), FetchError> {
        let staging = staging_dir(target);
        if fs::metadata(&staging).await.is_ok() {
            debug!(path = %staging.display(), "Removing stale extraction directory");
            fs::remove_dir_all(&staging)
                .await
                .map_err(|e| FetchError::io(format!("Failed to clear {}", staging.display()), e))?;
        }
        fs::create_dir_all(&staging)
            .await
            .map_err(|e| FetchError::io(format!("Failed to create {}", staging.display()), e))?;

        self.extractor.extract(tarball, &staging).await?;

        let expected = key.dataset_name();
        let entries = list_entries(&staging).await?;
        if entries.len() != 1 || entries[0] != expected {
            return Err(FetchError::ExtractionShape {
                archive: tarball.to_path_buf(),
                expected,
                found: entries.join(", "),
            });
        }

        // A re-run replaces what an earlier run left at the target
        if let Ok(meta) = fs::symlink_metadata(target).await {
            debug!(path = %target.display(), "Replacing existing dataset");
            let result = if meta.is_dir() {
                fs::remove_dir_all(target).await
            } else {
                fs::remove_file(target).await
            };
            result.map_err(|e| FetchError::io(format!("Failed to replace {}", target.display()), e))?;
        }

        debug!(from = %staging.join(&expected).display(), to = %target.display(), "Renaming extracted dataset");
        fs::rename(staging.join(&expected), target)
            .await
            .map_err(|e| FetchError::io(format!("Failed to move dataset to {}", target.display()), e))?;
        fs::remove_dir(&staging)
            .await
            .map_err(|e| FetchError::io(format!("Failed to remove {}", staging.display()), e))?;
        fs::remove_file(tarball)
            .await
            .map_err(|e| FetchError::io(format!("Failed to remove {}", tarball.display()), e))?;

        Ok(())
    }

    async fn emit(&self, event: TransferEvent) {
        if let Err(e) = self.reporter.record(&event).await {
            warn!(error = %e, "Failed to record transfer event");
        }
    }
}

/// `<target>.tar`
fn tarball_path(target: &Path) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_owned();
    name.push(".tar");
    PathBuf::from(name)
}

/// Private directory next to `target` that a tarball is unpacked into
fn staging_dir(target: &Path) -> PathBuf {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or(target.as_os_str()));
    name.push(".extract");
    parent.join(name)
}

async fn list_entries(dir: &Path) -> Result<Vec<String>, FetchError> {
    let mut reader = fs::read_dir(dir)
        .await
        .map_err(|e| FetchError::io(format!("Failed to list {}", dir.display()), e))?;

    let mut names = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| FetchError::io(format!("Failed to list {}", dir.display()), e))?
    {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Delete every `*irods-status` file in `tmp_dir`, returning how many went
pub async fn sweep_checkpoints(tmp_dir: &Path) -> Result<usize, FetchError> {
    let pattern = format!(
        "{}/*{}",
        Pattern::escape(&tmp_dir.to_string_lossy()),
        CHECKPOINT_SUFFIX
    );
    let paths = glob::glob(&pattern).map_err(|e| {
        FetchError::io(
            "Invalid checkpoint pattern",
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
        )
    })?;

    let mut removed = 0;
    for path in paths.flatten() {
        let meta = fs::symlink_metadata(&path)
            .await
            .map_err(|e| FetchError::io(format!("Failed to stat {}", path.display()), e))?;
        let result = if meta.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        result.map_err(|e| FetchError::io(format!("Failed to remove {}", path.display()), e))?;
        removed += 1;
    }
    Ok(removed)
}
