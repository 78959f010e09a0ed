//! Command-line interface for altaget.
//!
//! ```bash
//! altaget 180316 004-010 00-36          # fetch and verify
//! altaget 190101 001 00-39 Y            # force the three-digit online layout
//! altaget 181205 005 35 --dry-run       # show where the data is
//! altaget 181205 005 00-39 --check      # is every beam available?
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use uuid::Uuid;

use crate::config::{load_config, ResolvedConfig};
use crate::core::{
    parse_range, PathResolver, RangeCompare, TransferBatch, TransferOrchestrator,
    TransferSettings, VerificationPass,
};
use crate::domain::{EventType, ObservationDate, ObservationKey, TransferEvent};
use crate::report::{FanoutReporter, JsonlReporter, Reporter, TracingReporter};

/// altaget - fetch Apertif observations from the ALTA archive
#[derive(Parser, Debug)]
#[command(name = "altaget")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Date required! Format: YYMMDD e.g. 180309
    #[arg(required_unless_present = "show_config")]
    pub date: Option<String>,

    /// ID range required! Format: NNN-NNN e.g. 002-010
    #[arg(required_unless_present = "show_config")]
    pub id_range: Option<String>,

    /// Beam range required! Format: NN-NN e.g. 00-37
    #[arg(required_unless_present = "show_config")]
    pub beam_range: Option<String>,

    /// `Y` forces the three-digit online layout regardless of date
    pub force_legacy: Option<String>,

    /// Directory to put the downloaded datasets in
    #[arg(long, default_value = ".")]
    pub target_dir: PathBuf,

    /// Directory for checkpoint files and verification logs
    #[arg(long)]
    pub tmp_dir: Option<PathBuf>,

    /// Retry budget for each bulk copy
    #[arg(long)]
    pub retries: Option<u32>,

    /// Skip the irsync verification pass
    #[arg(long)]
    pub no_verify: bool,

    /// Compare range ends as text, like the historical scripts did
    #[arg(long)]
    pub lexical_ranges: bool,

    /// Resolve locations only; copy nothing
    #[arg(long, conflicts_with = "check")]
    pub dry_run: bool,

    /// Report whether each dataset is available; copy nothing
    #[arg(long)]
    pub check: bool,

    /// Append events as JSON lines (default file: <home>/runs/<run-id>.jsonl)
    #[arg(long, value_name = "FILE")]
    pub event_log: Option<Option<PathBuf>>,

    /// Show resolved configuration and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// `Y` is the only value that enables the legacy layout
    pub fn force_legacy(&self) -> bool {
        self.force_legacy.as_deref() == Some("Y")
    }

    pub fn range_compare(&self) -> RangeCompare {
        if self.lexical_ranges {
            RangeCompare::Lexical
        } else {
            RangeCompare::Numeric
        }
    }

    /// Parse the positional arguments into a batch
    pub fn batch(&self) -> Result<TransferBatch> {
        let date = self
            .date
            .as_deref()
            .context("Date required! Format: YYMMDD e.g. 180309")?;
        let id_range = self
            .id_range
            .as_deref()
            .context("ID range required! Format: NNN-NNN e.g. 002-010")?;
        let beam_range = self
            .beam_range
            .as_deref()
            .context("Beam range required! Format: NN-NN e.g. 00-37")?;

        let date: ObservationDate = date.parse()?;
        let task_ids = parse_range(id_range, self.range_compare())
            .with_context(|| format!("Invalid task ID range '{}'", id_range))?;
        let beams = parse_range(beam_range, self.range_compare())
            .with_context(|| format!("Invalid beam range '{}'", beam_range))?;

        Ok(TransferBatch {
            date,
            task_ids,
            beams,
            force_legacy: self.force_legacy(),
        })
    }

    fn settings(&self, config: &ResolvedConfig) -> TransferSettings {
        TransferSettings {
            target_dir: self.target_dir.clone(),
            tmp_dir: self
                .tmp_dir
                .clone()
                .or_else(|| config.tmp_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            retries: self.retries.unwrap_or(config.tools.retries),
        }
    }

    async fn reporter(&self, config: &ResolvedConfig, run_id: Uuid) -> Result<Arc<dyn Reporter>> {
        let path = match &self.event_log {
            None => return Ok(Arc::new(TracingReporter)),
            Some(Some(path)) => path.clone(),
            Some(None) => config.runs_dir().join(format!("{}.jsonl", run_id)),
        };
        let jsonl = JsonlReporter::open(path).await?;
        Ok(Arc::new(FanoutReporter::new(vec![
            Arc::new(TracingReporter) as Arc<dyn Reporter>,
            Arc::new(jsonl) as Arc<dyn Reporter>,
        ])))
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = load_config()?;
        if self.show_config {
            show_config(&config);
            return Ok(());
        }

        // Range errors abort before anything touches the archive
        let batch = self.batch()?;
        let settings = self.settings(&config);
        let run_id = Uuid::new_v4();
        let reporter = self.reporter(&config, run_id).await?;

        let resolver = Arc::new(PathResolver::new(
            config.policy(),
            Arc::new(config.tools.probe()),
        ));

        if self.check {
            check_availability(&resolver, &batch, reporter.as_ref(), run_id).await?;
            return Ok(());
        }

        let orchestrator = TransferOrchestrator::new(
            resolver.clone(),
            Arc::new(config.tools.copier()),
            Arc::new(config.tools.extractor()),
            reporter.clone(),
            settings.clone(),
        )
        .with_run_id(run_id);

        if self.dry_run {
            for (key, location) in orchestrator.plan(&batch).await? {
                println!("{}  {:<7} {}", key, location.tier.to_string(), location.path);
            }
            return Ok(());
        }

        let summary = orchestrator.run(&batch).await?;
        println!(
            "Transferred {} dataset(s) ({} directories, {} tarballs) in {:.2} min",
            summary.transferred,
            summary.directories,
            summary.tarballs,
            summary.elapsed.as_secs_f64() / 60.0
        );

        if !self.no_verify {
            let report = VerificationPass::new(
                run_id,
                resolver,
                Arc::new(config.tools.differ()),
                reporter,
                settings,
            )
            .with_marker(config.verify_marker)
            .run(&batch)
            .await?;

            for task in &report.tasks {
                println!(
                    "Task ID {:03}: {} failed file(s)",
                    task.task_id, task.failed_files
                );
            }
        }

        Ok(())
    }
}

/// Print and record whether each key of the batch is available
async fn check_availability(
    resolver: &PathResolver,
    batch: &TransferBatch,
    reporter: &dyn Reporter,
    run_id: Uuid,
) -> Result<Vec<(ObservationKey, bool)>> {
    let mut results = Vec::new();
    for key in batch.keys() {
        let available = resolver
            .is_available(&key)
            .await
            .with_context(|| format!("Failed to check availability of {}", key))?;
        let event = TransferEvent::new(
            run_id,
            Some(key),
            EventType::Availability,
            format!("{} available: {}", key, available),
        );
        if let Err(e) = reporter.record(&event).await {
            warn!(error = %e, "Failed to record availability event");
        }
        println!("{}  {}", key, if available { "available" } else { "missing" });
        results.push((key, available));
    }
    Ok(results)
}

fn show_config(cfg: &ResolvedConfig) {
    println!("altaget configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:    {}", cfg.home.display());
    println!("  Runs:    {}", cfg.runs_dir().display());
    println!(
        "  Tmp dir: {}",
        cfg.tmp_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(current directory)".to_string())
    );
    println!();
    println!("Archive roots:");
    println!("  Online:  {}", cfg.roots.online);
    println!("  Ingest:  {}", cfg.roots.ingest);
    println!("  Staged:  {}", cfg.roots.staged);
    println!("  Cold:    {}", cfg.roots.cold);
    println!();
    println!("Ingest exceptions:");
    for e in &cfg.ingest_exceptions {
        println!("  {:06} task {:03}", e.date, e.task_id);
    }
    println!();
    println!("Tools:");
    println!("  ils:     {}", cfg.tools.ils);
    println!("  iget:    {} (retries: {})", cfg.tools.iget, cfg.tools.retries);
    println!("  irsync:  {}", cfg.tools.irsync);
    println!("  tar:     {}", cfg.tools.tar);
    println!("  Probe timeout: {:?}", cfg.tools.probe_timeout);
    println!("  Copy timeout:  {:?}", cfg.tools.copy_timeout);
    println!("  Verify marker: {}", cfg.verify_marker);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clap::CommandFactory;

    use crate::adapters::TierProbe;
    use crate::core::{ArchivePolicy, FetchError};

    struct EverythingExists;

    #[async_trait]
    impl TierProbe for EverythingExists {
        async fn exists(&self, _path: &str) -> Result<bool, FetchError> {
            Ok(true)
        }
    }

    struct FullDisk;

    #[async_trait]
    impl Reporter for FullDisk {
        async fn record(&self, _event: &TransferEvent) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn test_check_survives_reporter_failure() {
        let resolver = PathResolver::new(ArchivePolicy::default(), Arc::new(EverythingExists));
        let batch = TransferBatch {
            date: ObservationDate::new(181205).unwrap(),
            task_ids: vec![5, 6],
            beams: vec![0],
            force_legacy: false,
        };

        let results = check_availability(&resolver, &batch, &FullDisk, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, available)| *available));
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_positional_arguments() {
        let cli = Cli::try_parse_from(["altaget", "180316", "004-006", "00-01"]).unwrap();
        assert!(!cli.force_legacy());

        let batch = cli.batch().unwrap();
        assert_eq!(batch.date.value(), 180316);
        assert_eq!(batch.task_ids, vec![4, 5, 6]);
        assert_eq!(batch.beams, vec![0, 1]);
        assert!(!batch.force_legacy);
    }

    #[test]
    fn test_force_legacy_only_for_y() {
        let yes = Cli::try_parse_from(["altaget", "190101", "1", "0", "Y"]).unwrap();
        assert!(yes.force_legacy());

        for other in ["y", "N", "yes"] {
            let cli = Cli::try_parse_from(["altaget", "190101", "1", "0", other]).unwrap();
            assert!(!cli.force_legacy(), "{} should not force legacy", other);
        }
    }

    #[test]
    fn test_missing_positionals_rejected() {
        assert!(Cli::try_parse_from(["altaget", "180316", "004"]).is_err());
        assert!(Cli::try_parse_from(["altaget"]).is_err());
        assert!(Cli::try_parse_from(["altaget", "--show-config"]).is_ok());
    }

    #[test]
    fn test_reversed_range_fails_batch() {
        let cli = Cli::try_parse_from(["altaget", "180316", "05-04", "00"]).unwrap();
        let err = cli.batch().unwrap_err();
        assert!(format!("{:#}", err).contains("end should not be smaller than begin"));
    }

    #[test]
    fn test_lexical_ranges_flag() {
        let cli = Cli::try_parse_from(["altaget", "180316", "9-10", "0", "--lexical-ranges"])
            .unwrap();
        assert!(cli.batch().is_err());

        let cli = Cli::try_parse_from(["altaget", "180316", "9-10", "0"]).unwrap();
        assert_eq!(cli.batch().unwrap().task_ids, vec![9, 10]);
    }

    #[test]
    fn test_event_log_optional_value() {
        let cli = Cli::try_parse_from(["altaget", "180316", "1", "0", "--event-log"]).unwrap();
        assert_eq!(cli.event_log, Some(None));

        let cli =
            Cli::try_parse_from(["altaget", "180316", "1", "0", "--event-log", "events.jsonl"])
                .unwrap();
        assert_eq!(cli.event_log, Some(Some(PathBuf::from("events.jsonl"))));
    }
}
