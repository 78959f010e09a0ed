//! Domain types for altaget.
//!
//! - Observation: date and key identifying one beam dataset
//! - Location: where the archive holds it
//! - Events: structured progress records

pub mod events;
pub mod location;
pub mod observation;

// Re-export commonly used types
pub use events::{EventType, TransferEvent};
pub use location::{ArchiveLocation, ArchiveTier, LocationKind};
pub use observation::{ObservationDate, ObservationKey};
