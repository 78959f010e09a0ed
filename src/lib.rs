//! altaget - fetch Apertif observations from the ALTA archive
//!
//! Datasets have moved between several storage layouts over the life of the
//! archive. altaget works out where each beam of an observation currently
//! lives, copies it with the iRODS client tools, unpacks staged tarballs and
//! optionally verifies the result with `irsync`.
//!
//! # Modules
//!
//! - `core`: range notation, location policy, transfer loop, verification
//! - `adapters`: `ils`, `iget`, `irsync` and `tar` invocations
//! - `domain`: observation keys, archive locations, progress events
//! - `report`: reporters that receive progress events
//! - `config`: config file and environment handling
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Tasks 004-010, beams 00-36 of 180316, into the current directory
//! altaget 180316 004-010 00-36
//!
//! # Only show where each dataset is
//! altaget 181205 005 00-39 --dry-run
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod report;

// Re-export main types at crate root for convenience
pub use core::{
    parse_range, FetchError, PathResolver, RangeCompare, RangeError, TransferBatch,
    TransferOrchestrator, VerificationPass,
};
pub use domain::{ArchiveLocation, ArchiveTier, LocationKind, ObservationDate, ObservationKey};
pub use report::Reporter;
