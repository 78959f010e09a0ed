//! Core fetch logic.
//!
//! This module contains:
//! - RangeSpec: task-id / beam list notation
//! - Resolver: the archive location policy
//! - Orchestrator: the transfer loop
//! - Verify: post-transfer sync-diff pass

pub mod error;
pub mod orchestrator;
pub mod range_spec;
pub mod resolver;
pub mod verify;

// Re-export commonly used types
pub use error::{FetchError, RangeError};
pub use orchestrator::{
    sweep_checkpoints, TransferBatch, TransferOrchestrator, TransferSettings, TransferSummary,
};
pub use range_spec::{parse_range, RangeCompare, RangeSpec};
pub use resolver::{ArchivePolicy, ArchiveRoots, IngestException, Layout, PathResolver, RULES};
pub use verify::{VerificationPass, VerificationReport};
