//! iRODS client adapters: `ils`, `iget` and `irsync`.
//!
//! Each adapter shells out to the icommands binary with an argument vector.
//! The client environment (`~/.irods`) must already be initialised.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::process::ToolCommand;
use super::{BulkCopy, CopyRequest, SyncDiff, TierProbe};
use crate::core::error::FetchError;

/// stderr fragments `ils` prints when a path is simply missing
pub const DEFAULT_NOT_FOUND_MARKERS: &[&str] = &[
    "does not exist",
    "CAT_NO_ROWS_FOUND",
    "USER_FILE_DOES_NOT_EXIST",
];

/// Existence probe using `ils <path>`
#[derive(Debug, Clone)]
pub struct IlsProbe {
    binary_path: String,
    timeout: Option<Duration>,
    not_found_markers: Vec<String>,
}

impl Default for IlsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl IlsProbe {
    pub fn new() -> Self {
        Self::with_binary_path("ils")
    }

    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout: None,
            not_found_markers: DEFAULT_NOT_FOUND_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_not_found_markers(mut self, markers: Vec<String>) -> Self {
        self.not_found_markers = markers;
        self
    }

    /// Decide between "absent" and "probe failed" for a non-zero exit
    fn is_not_found(&self, stderr: &str) -> bool {
        self.not_found_markers
            .iter()
            .any(|marker| stderr.contains(marker.as_str()))
    }
}

#[async_trait]
impl TierProbe for IlsProbe {
    async fn exists(&self, path: &str) -> Result<bool, FetchError> {
        let output = ToolCommand::new(&self.binary_path)
            .arg(path)
            .timeout(self.timeout)
            .output()
            .await
            .map_err(|e| FetchError::ProbeFailure {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            debug!(path, "Archive path exists");
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if self.is_not_found(&stderr) {
            debug!(path, "Archive path not found");
            Ok(false)
        } else {
            Err(FetchError::ProbeFailure {
                path: path.to_string(),
                reason: format!(
                    "{} exited with code {}: {}",
                    self.binary_path,
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            })
        }
    }
}

/// Bulk copy using `iget`
#[derive(Debug, Clone)]
pub struct IgetCopier {
    binary_path: String,
    timeout: Option<Duration>,
}

impl Default for IgetCopier {
    fn default() -> Self {
        Self::new()
    }
}

impl IgetCopier {
    pub fn new() -> Self {
        Self::with_binary_path("iget")
    }

    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `-r` recursive, `-f` overwrite, `-P` progress, `-I` redirect, `-T` renew socket
    fn command(&self, request: &CopyRequest) -> ToolCommand {
        ToolCommand::new(&self.binary_path)
            .arg("-rfPIT")
            .arg("-X")
            .arg(&request.checkpoint)
            .arg("--lfrestart")
            .arg(&request.lf_checkpoint)
            .arg("--retries")
            .arg(request.retries.to_string())
            .arg(&request.source)
            .arg(&request.destination)
            .timeout(self.timeout)
    }
}

#[async_trait]
impl BulkCopy for IgetCopier {
    async fn copy(&self, request: &CopyRequest) -> Result<(), FetchError> {
        self.command(request).run_checked().await?;
        Ok(())
    }
}

/// Report-only sync check using `irsync -srl`
#[derive(Debug, Clone)]
pub struct IrsyncDiff {
    binary_path: String,
    timeout: Option<Duration>,
}

impl Default for IrsyncDiff {
    fn default() -> Self {
        Self::new()
    }
}

impl IrsyncDiff {
    pub fn new() -> Self {
        Self::with_binary_path("irsync")
    }

    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `-s` size only, `-r` recursive, `-l` list differences without syncing
    fn command(&self, remote: &str, local: &Path) -> ToolCommand {
        ToolCommand::new(&self.binary_path)
            .arg("-srl")
            .arg(format!("i:{}", remote))
            .arg(local)
            .timeout(self.timeout)
    }
}

#[async_trait]
impl SyncDiff for IrsyncDiff {
    async fn diff(&self, remote: &str, local: &Path) -> Result<String, FetchError> {
        self.command(remote, local).run_checked().await
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::path::PathBuf;

    use super::*;

    fn request() -> CopyRequest {
        CopyRequest {
            source: "/altaZone/archive/x/181205005/WSRTA181205005_B035.MS".to_string(),
            destination: PathBuf::from("data/WSRTA181205005_B035.MS"),
            checkpoint: PathBuf::from("tmp/WSRTA181205005_B035-icat.irods-status"),
            lf_checkpoint: PathBuf::from("tmp/WSRTA181205005_B035-icat.lf-irods-status"),
            retries: 5,
        }
    }

    #[test]
    fn test_iget_arguments() {
        let cmd = IgetCopier::new().command(&request());
        let args: Vec<OsString> = cmd.args().to_vec();
        let expected: Vec<OsString> = [
            "-rfPIT",
            "-X",
            "tmp/WSRTA181205005_B035-icat.irods-status",
            "--lfrestart",
            "tmp/WSRTA181205005_B035-icat.lf-irods-status",
            "--retries",
            "5",
            "/altaZone/archive/x/181205005/WSRTA181205005_B035.MS",
            "data/WSRTA181205005_B035.MS",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        assert_eq!(cmd.program(), "iget");
        assert_eq!(args, expected);
    }

    #[test]
    fn test_irsync_arguments() {
        let cmd = IrsyncDiff::new().command("/zone/a.MS", Path::new("./a.MS"));
        assert_eq!(cmd.display(), "irsync -srl i:/zone/a.MS ./a.MS");
    }

    #[test]
    fn test_not_found_classification() {
        let probe = IlsProbe::new();
        assert!(probe.is_not_found(
            "ERROR: lsUtil: srcPath /altaZone/x does not exist or user lacks access permission"
        ));
        assert!(!probe.is_not_found("connectToRhost error, status = -115000"));
    }

    #[tokio::test]
    async fn test_probe_success_means_exists() {
        let probe = IlsProbe::with_binary_path("true");
        assert!(probe.exists("/altaZone/any").await.unwrap());
    }

    #[tokio::test]
    async fn test_probe_unexplained_failure_is_error() {
        let probe = IlsProbe::with_binary_path("false");
        let err = probe.exists("/altaZone/any").await.unwrap_err();
        assert!(matches!(err, FetchError::ProbeFailure { .. }));
    }

    #[tokio::test]
    async fn test_probe_missing_binary_is_error() {
        let probe = IlsProbe::with_binary_path("/nonexistent/ils");
        let err = probe.exists("/altaZone/any").await.unwrap_err();
        assert!(matches!(err, FetchError::ProbeFailure { .. }));
    }
}
