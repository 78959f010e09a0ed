//! Error taxonomy for resolving and fetching datasets.
//!
//! Every variant is fatal to a batch; the only retries happen inside the
//! bulk-copy tool's own retry budget.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while parsing a range specification such as `00-04,07`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("In specification {token}, end should not be smaller than begin")]
    InvalidRange { token: String },

    #[error("Cannot parse '{token}' in range specification: {reason}")]
    Parse { token: String, reason: String },
}

/// Failure while resolving, transferring or verifying a dataset
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid observation date '{value}' (expected YYMMDD, e.g. 180309)")]
    InvalidDate { value: String },

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("Existence probe for {path} failed: {reason}")]
    ProbeFailure { path: String, reason: String },

    #[error("{tool} failed ({status}): {stderr}")]
    TransferInvocation {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Tarball {archive} must contain exactly one entry named {expected}, found [{found}]")]
    ExtractionShape {
        archive: PathBuf,
        expected: String,
        found: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Wrap an I/O error with a description of what was being done
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
