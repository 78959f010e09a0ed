//! Configuration for altaget.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ALTAGET_HOME, ALTAGET_TMPDIR)
//! 2. Config file (.altaget/config.yaml)
//! 3. Defaults (~/.altaget, ALTA production roots)
//!
//! Config file discovery:
//! - Searches current directory and parents for .altaget/config.yaml
//! - Relative paths in the config file are resolved against the project root
//!   (the directory containing .altaget/)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::irods::DEFAULT_NOT_FOUND_MARKERS;
use crate::adapters::{IgetCopier, IlsProbe, IrsyncDiff, TarExtractor};
use crate::core::orchestrator::DEFAULT_RETRIES;
use crate::core::resolver::{default_ingest_exceptions, ArchiveRoots, IngestException};
use crate::core::verify::DEFAULT_MISMATCH_MARKER;
use crate::core::ArchivePolicy;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub tmp_dir: Option<String>,
    #[serde(default)]
    pub roots: Option<ArchiveRoots>,
    #[serde(default)]
    pub tools: Option<ToolsConfig>,
    #[serde(default)]
    pub ingest_exceptions: Option<Vec<IngestException>>,
    #[serde(default)]
    pub verify: Option<VerifyConfig>,
    #[serde(default)]
    pub probe: Option<ProbeConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    pub ils: Option<String>,
    pub iget: Option<String>,
    pub irsync: Option<String>,
    pub tar: Option<String>,
    pub retries: Option<u32>,
    pub probe_timeout_seconds: Option<u64>,
    pub copy_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    pub marker: Option<char>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    pub not_found_markers: Option<Vec<String>>,
}

/// Tool binaries and invocation limits
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub ils: String,
    pub iget: String,
    pub irsync: String,
    pub tar: String,
    pub retries: u32,
    pub probe_timeout: Option<Duration>,
    pub copy_timeout: Option<Duration>,
    pub not_found_markers: Vec<String>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ils: "ils".to_string(),
            iget: "iget".to_string(),
            irsync: "irsync".to_string(),
            tar: "tar".to_string(),
            retries: DEFAULT_RETRIES,
            probe_timeout: Some(Duration::from_secs(60)),
            copy_timeout: None,
            not_found_markers: DEFAULT_NOT_FOUND_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl ToolSettings {
    pub fn probe(&self) -> IlsProbe {
        IlsProbe::with_binary_path(&self.ils)
            .with_timeout(self.probe_timeout)
            .with_not_found_markers(self.not_found_markers.clone())
    }

    pub fn copier(&self) -> IgetCopier {
        IgetCopier::with_binary_path(&self.iget).with_timeout(self.copy_timeout)
    }

    pub fn differ(&self) -> IrsyncDiff {
        IrsyncDiff::with_binary_path(&self.irsync).with_timeout(self.copy_timeout)
    }

    pub fn extractor(&self) -> TarExtractor {
        TarExtractor::with_binary_path(&self.tar).with_timeout(self.copy_timeout)
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to altaget home (event logs)
    pub home: PathBuf,
    /// Temporary-file directory override (checkpoints, verify logs)
    pub tmp_dir: Option<PathBuf>,
    /// Archive tier roots
    pub roots: ArchiveRoots,
    /// Hand-ingested observations
    pub ingest_exceptions: Vec<IngestException>,
    /// External tools
    pub tools: ToolSettings,
    /// Marker counted as a failed file in verification logs
    pub verify_marker: char,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Directory holding per-run event logs
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }

    pub fn policy(&self) -> ArchivePolicy {
        ArchivePolicy::new(self.roots.clone(), self.ingest_exceptions.clone())
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".altaget").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge a parsed file over the defaults; environment is applied afterwards
fn resolve(config: Option<(PathBuf, ConfigFile)>, default_home: PathBuf) -> ResolvedConfig {
    let mut resolved = ResolvedConfig {
        home: default_home,
        tmp_dir: None,
        roots: ArchiveRoots::default(),
        ingest_exceptions: default_ingest_exceptions(),
        tools: ToolSettings::default(),
        verify_marker: DEFAULT_MISMATCH_MARKER,
        config_file: None,
    };

    let Some((config_path, file)) = config else {
        return resolved;
    };

    // Project root is the parent of .altaget/
    let base_dir = config_path
        .parent()
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."))
        .to_path_buf();

    if let Some(ref home) = file.home {
        resolved.home = resolve_path(&base_dir, home);
    }
    resolved.tmp_dir = file.tmp_dir.as_deref().map(|t| resolve_path(&base_dir, t));
    if let Some(roots) = file.roots {
        resolved.roots = roots;
    }
    if let Some(exceptions) = file.ingest_exceptions {
        resolved.ingest_exceptions = exceptions;
    }
    if let Some(tools) = file.tools {
        let t = &mut resolved.tools;
        if let Some(ils) = tools.ils {
            t.ils = ils;
        }
        if let Some(iget) = tools.iget {
            t.iget = iget;
        }
        if let Some(irsync) = tools.irsync {
            t.irsync = irsync;
        }
        if let Some(tar) = tools.tar {
            t.tar = tar;
        }
        t.retries = tools.retries.unwrap_or(t.retries);
        if let Some(secs) = tools.probe_timeout_seconds {
            t.probe_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = tools.copy_timeout_seconds {
            t.copy_timeout = Some(Duration::from_secs(secs));
        }
    }
    if let Some(markers) = file.probe.and_then(|p| p.not_found_markers) {
        resolved.tools.not_found_markers = markers;
    }
    if let Some(marker) = file.verify.and_then(|v| v.marker) {
        resolved.verify_marker = marker;
    }
    resolved.config_file = Some(config_path);

    resolved
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".altaget");

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let file = match find_config_file(&cwd) {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    Ok(apply_env(
        resolve(file, default_home),
        std::env::var("ALTAGET_HOME").ok(),
        std::env::var("ALTAGET_TMPDIR").ok(),
    ))
}

/// Apply environment overrides, which win over the file and the defaults
fn apply_env(
    mut resolved: ResolvedConfig,
    home: Option<String>,
    tmp_dir: Option<String>,
) -> ResolvedConfig {
    if let Some(home) = home {
        resolved.home = PathBuf::from(home);
    }
    if let Some(tmp_dir) = tmp_dir {
        resolved.tmp_dir = Some(PathBuf::from(tmp_dir));
    }
    resolved
}
