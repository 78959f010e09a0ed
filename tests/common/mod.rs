//! Fake archive tools shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use altaget::adapters::{BulkCopy, CopyRequest, Extractor, SyncDiff, TierProbe};
use altaget::domain::TransferEvent;
use altaget::{FetchError, ObservationDate, ObservationKey, Reporter};
use async_trait::async_trait;

pub fn key(date: u32, task_id: u32, beam_id: u32) -> ObservationKey {
    ObservationKey::new(ObservationDate::new(date).unwrap(), task_id, beam_id)
}

/// Probe answering from a fixed set of existing paths
#[derive(Default)]
pub struct FakeProbe {
    existing: HashSet<String>,
    all_staged: bool,
    unreachable: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeProbe {
    pub fn with_paths(paths: &[&str]) -> Self {
        Self {
            existing: paths.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Every `.MS.tar` candidate exists
    pub fn all_staged() -> Self {
        Self {
            all_staged: true,
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TierProbe for FakeProbe {
    async fn exists(&self, path: &str) -> Result<bool, FetchError> {
        self.calls.lock().unwrap().push(path.to_string());
        if self.unreachable {
            return Err(FetchError::ProbeFailure {
                path: path.to_string(),
                reason: "connectToRhost error".to_string(),
            });
        }
        Ok(self.existing.contains(path) || (self.all_staged && path.ends_with(".MS.tar")))
    }
}

/// Copier that materialises the destination locally
#[derive(Default)]
pub struct FakeCopier {
    fail: bool,
    requests: Mutex<Vec<CopyRequest>>,
}

impl FakeCopier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<CopyRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BulkCopy for FakeCopier {
    async fn copy(&self, request: &CopyRequest) -> Result<(), FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        // iget leaves its restart file behind while running
        std::fs::write(&request.checkpoint, b"restart").unwrap();

        if self.fail {
            return Err(FetchError::TransferInvocation {
                tool: "iget".to_string(),
                status: "exit code 3".to_string(),
                stderr: "SYS_SOCK_READ_TIMEDOUT".to_string(),
            });
        }

        if request.source.ends_with(".tar") {
            std::fs::write(&request.destination, b"tarball").unwrap();
        } else {
            std::fs::create_dir_all(&request.destination).unwrap();
            std::fs::write(request.destination.join("table.dat"), b"vis").unwrap();
        }
        Ok(())
    }
}

/// Extractor that creates the configured top-level entries
pub struct FakeExtractor {
    entries: Vec<String>,
}

impl FakeExtractor {
    pub fn producing(entries: &[&str]) -> Self {
        Self {
            entries: entries.iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, archive: &Path, into: &Path) -> Result<(), FetchError> {
        assert!(archive.exists(), "tarball should exist before extraction");
        for entry in &self.entries {
            let dir = into.join(entry);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("table.dat"), b"vis").unwrap();
        }
        Ok(())
    }
}

/// Sync-diff returning a canned report per archive path
#[derive(Default)]
pub struct FakeDiff {
    reports: Vec<(String, String)>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeDiff {
    pub fn with_reports(reports: &[(&str, &str)]) -> Self {
        Self {
            reports: reports
                .iter()
                .map(|(p, r)| (p.to_string(), r.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncDiff for FakeDiff {
    async fn diff(&self, remote: &str, local: &Path) -> Result<String, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((remote.to_string(), local.display().to_string()));
        Ok(self
            .reports
            .iter()
            .find(|(path, _)| path == remote)
            .map(|(_, report)| report.clone())
            .unwrap_or_default())
    }
}

/// Reporter whose sink is always broken
pub struct BrokenReporter;

#[async_trait]
impl Reporter for BrokenReporter {
    async fn record(&self, _event: &TransferEvent) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }
}
