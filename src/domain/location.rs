//! Resolved archive locations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shape of the object stored at a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// A measurement-set collection that can be copied as-is
    Directory,

    /// A `.MS.tar` that must be extracted after copying
    Tarball,
}

/// Storage tier that holds a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveTier {
    /// Working-data area the correlator wrote to
    Online,

    /// Manually re-ingested datasets
    Ingest,

    /// Near-line area holding tarballs
    Staged,

    /// Deep archive
    Cold,
}

impl fmt::Display for ArchiveTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArchiveTier::Online => "online",
            ArchiveTier::Ingest => "ingest",
            ArchiveTier::Staged => "staged",
            ArchiveTier::Cold => "cold",
        };
        f.write_str(name)
    }
}

/// Where a dataset currently lives in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveLocation {
    pub path: String,
    pub kind: LocationKind,
    pub tier: ArchiveTier,
}

impl ArchiveLocation {
    pub fn is_tarball(&self) -> bool {
        self.kind == LocationKind::Tarball
    }
}

impl fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.tier)
    }
}
