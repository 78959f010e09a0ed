//! Adapter interfaces for the external tools altaget drives.
//!
//! The archive is only ever reached through these traits, so the resolution
//! policy and the transfer loop can be exercised against fakes.

pub mod irods;
pub mod process;
pub mod tar;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::error::FetchError;

pub use irods::{IgetCopier, IlsProbe, IrsyncDiff};
pub use process::{ToolCommand, ToolError};
pub use tar::TarExtractor;

/// Existence check against the archive listing service
#[async_trait]
pub trait TierProbe: Send + Sync {
    /// `Ok(false)` means the path is absent; an unreachable archive is an error
    async fn exists(&self, path: &str) -> Result<bool, FetchError>;
}

/// One bulk copy from the archive to local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    /// Archive path (collection or tarball)
    pub source: String,

    /// Local destination path
    pub destination: PathBuf,

    /// Restart state file for the transfer
    pub checkpoint: PathBuf,

    /// Restart state file for large-file (parallel) transfers
    pub lf_checkpoint: PathBuf,

    /// Retry budget handed to the copy tool
    pub retries: u32,
}

/// Recursive, restartable copy tool
#[async_trait]
pub trait BulkCopy: Send + Sync {
    async fn copy(&self, request: &CopyRequest) -> Result<(), FetchError>;
}

/// Unpacks a tarball into a directory
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, archive: &Path, into: &Path) -> Result<(), FetchError>;
}

/// Report-only comparison of an archive path against a local copy
#[async_trait]
pub trait SyncDiff: Send + Sync {
    /// Returns the tool's line-oriented report
    async fn diff(&self, remote: &str, local: &Path) -> Result<String, FetchError>;
}
