//! Structured progress events emitted while fetching data.
//!
//! Events are handed to an injected [`Reporter`](crate::report::Reporter);
//! nothing in the fetch path logs progress through a global sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::ArchiveLocation;
use super::observation::ObservationKey;

/// A single progress event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The batch this event belongs to
    pub run_id: Uuid,

    /// Observation key, for per-item events
    pub key: Option<ObservationKey>,

    /// Type of event
    pub event_type: EventType,

    /// Human-readable summary
    pub summary: String,

    /// Resolved location, once known
    pub location: Option<ArchiveLocation>,

    /// Failed-file count reported by verification
    pub failed_files: Option<u64>,

    /// Time taken in milliseconds
    pub duration_ms: Option<u64>,

    /// Error message if failed
    pub error: Option<String>,
}

impl TransferEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        run_id: Uuid,
        key: Option<ObservationKey>,
        event_type: EventType,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id,
            key,
            event_type,
            summary: summary.into(),
            location: None,
            failed_files: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_location(mut self, location: ArchiveLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_failed_files(mut self, failed_files: u64) -> Self {
        self.failed_files = Some(failed_files);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

/// Kinds of progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BatchStarted,
    BatchCompleted,
    BatchFailed,

    /// Archive location chosen for an item
    Resolved,

    /// Bulk copy of an item started
    CopyStarted,

    /// Bulk copy of an item finished
    CopyCompleted,

    /// Tarball extracted and renamed into place
    Extracted,

    /// Restart-checkpoint files removed after the batch
    CheckpointsSwept,

    /// Sync-diff run for an item
    Verified,

    /// Failed-file count for a task id
    VerificationSummary,

    /// Availability probe result for an item
    Availability,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArchiveTier, LocationKind, ObservationDate};

    #[test]
    fn test_event_serialization() {
        let key = ObservationKey::new(ObservationDate::new(181205).unwrap(), 5, 35);
        let event = TransferEvent::new(Uuid::new_v4(), Some(key), EventType::Resolved, "resolved")
            .with_location(ArchiveLocation {
                path: "/x/181205005/WSRTA181205005_B035.MS.tar".to_string(),
                kind: LocationKind::Tarball,
                tier: ArchiveTier::Staged,
            });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"resolved\""));
        assert!(json.contains("\"kind\":\"tarball\""));

        let parsed: TransferEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type, EventType::Resolved);
        assert_eq!(parsed.key, Some(key));
    }

    #[test]
    fn test_event_builders() {
        let event = TransferEvent::new(Uuid::new_v4(), None, EventType::BatchFailed, "failed")
            .with_duration(1500)
            .with_error("iget exited with status 3".to_string());

        assert_eq!(event.duration_ms, Some(1500));
        assert_eq!(event.error.as_deref(), Some("iget exited with status 3"));
        assert!(event.failed_files.is_none());
    }
}
