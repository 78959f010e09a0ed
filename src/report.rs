//! Reporters receive structured progress events.
//!
//! The orchestrator and verification pass are handed a reporter explicitly;
//! there is no process-wide event sink.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::domain::{EventType, TransferEvent};

/// Sink for progress events
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn record(&self, event: &TransferEvent) -> Result<()>;
}

/// Writes each event as a tracing record
#[derive(Debug, Default, Clone)]
pub struct TracingReporter;

#[async_trait]
impl Reporter for TracingReporter {
    async fn record(&self, event: &TransferEvent) -> Result<()> {
        let key = event.key.map(|k| k.to_string()).unwrap_or_default();
        match (event.event_type, event.failed_files) {
            (EventType::BatchFailed, _) => warn!(
                run_id = %event.run_id,
                error = event.error.as_deref().unwrap_or(""),
                "{}",
                event.summary
            ),
            (EventType::VerificationSummary, Some(failed)) if failed > 0 => warn!(
                run_id = %event.run_id,
                failed_files = failed,
                "{}",
                event.summary
            ),
            _ => info!(
                run_id = %event.run_id,
                key = %key,
                event = ?event.event_type,
                "{}",
                event.summary
            ),
        }
        Ok(())
    }
}

/// Appends events to a newline-delimited JSON file
pub struct JsonlReporter {
    path: PathBuf,
}

impl JsonlReporter {
    /// Create the parent directory and return a reporter appending to `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create event log directory: {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event back, skipping blank lines
    pub async fn replay(&self) -> Result<Vec<TransferEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read event log: {}", self.path.display()))?;

        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(line_num, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Failed to parse event at line {}", line_num + 1))
            })
            .collect()
    }
}

#[async_trait]
impl Reporter for JsonlReporter {
    async fn record(&self, event: &TransferEvent) -> Result<()> {
        let json = serde_json::to_string(event).context("Failed to serialize event")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open event log: {}", self.path.display()))?;

        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event log")?;

        Ok(())
    }
}

/// Forwards every event to several reporters in order
#[derive(Default)]
pub struct FanoutReporter {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl FanoutReporter {
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Self {
        Self { reporters }
    }
}

#[async_trait]
impl Reporter for FanoutReporter {
    async fn record(&self, event: &TransferEvent) -> Result<()> {
        for reporter in &self.reporters {
            reporter.record(event).await?;
        }
        Ok(())
    }
}

/// Keeps events in memory; handy for tests and summaries
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<TransferEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TransferEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn event_types(&self) -> Vec<EventType> {
        self.events().iter().map(|e| e.event_type).collect()
    }
}

#[async_trait]
impl Reporter for MemoryReporter {
    async fn record(&self, event: &TransferEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory reporter lock poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_jsonl_roundtrip() {
        let temp = TempDir::new().unwrap();
        let reporter = JsonlReporter::open(temp.path().join("runs/batch.jsonl"))
            .await
            .unwrap();

        let run_id = Uuid::new_v4();
        reporter
            .record(&TransferEvent::new(run_id, None, EventType::BatchStarted, "start"))
            .await
            .unwrap();
        reporter
            .record(&TransferEvent::new(run_id, None, EventType::BatchCompleted, "done"))
            .await
            .unwrap();

        let events = reporter.replay().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::BatchStarted);
        assert_eq!(events[1].summary, "done");
    }

    #[tokio::test]
    async fn test_fanout_reaches_all() {
        let a = Arc::new(MemoryReporter::new());
        let b = Arc::new(MemoryReporter::new());
        let fanout = FanoutReporter::new(vec![
            a.clone() as Arc<dyn Reporter>,
            b.clone() as Arc<dyn Reporter>,
        ]);

        fanout
            .record(&TransferEvent::new(Uuid::new_v4(), None, EventType::Resolved, "x"))
            .await
            .unwrap();

        assert_eq!(a.event_types(), vec![EventType::Resolved]);
        assert_eq!(b.event_types(), vec![EventType::Resolved]);
    }
}
