//! Archive location policy.
//!
//! The archive has been reorganised several times, so where a dataset lives
//! depends on its date, on a few hand-ingested exceptions, and on whether a
//! tarball of it currently sits in the staging area. The policy is an
//! ordered rule table evaluated first-match-wins; the cold archive is the
//! fallback when no rule applies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapters::TierProbe;
use crate::domain::{ArchiveLocation, ArchiveTier, LocationKind, ObservationKey};

use super::error::FetchError;

/// Observations before this date use two-digit task ids
pub const TWO_DIGIT_CUTOVER: u32 = 180216;

/// Observations before this date are in the online working-data area
pub const ONLINE_CUTOVER: u32 = 181003;

/// Root collection of each archive tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRoots {
    #[serde(default = "default_online_root")]
    pub online: String,
    #[serde(default = "default_ingest_root")]
    pub ingest: String,
    #[serde(default = "default_staged_root")]
    pub staged: String,
    #[serde(default = "default_cold_root")]
    pub cold: String,
}

fn default_online_root() -> String {
    "/altaZone/home/apertif_main/wcudata".to_string()
}
fn default_ingest_root() -> String {
    "/altaZone/ingest/apertif_main/visibilities_default".to_string()
}
fn default_staged_root() -> String {
    "/altaZone/stage/apertif_main/visibilities_default".to_string()
}
fn default_cold_root() -> String {
    "/altaZone/archive/apertif_main/visibilities_default".to_string()
}

impl Default for ArchiveRoots {
    fn default() -> Self {
        Self {
            online: default_online_root(),
            ingest: default_ingest_root(),
            staged: default_staged_root(),
            cold: default_cold_root(),
        }
    }
}

/// An observation that was re-ingested by hand and lives in the ingest tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestException {
    pub date: u32,
    pub task_id: u32,
}

pub fn default_ingest_exceptions() -> Vec<IngestException> {
    vec![IngestException {
        date: 190326,
        task_id: 1,
    }]
}

/// Path template of one archive layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `<online>/WSRTA<date><tt>/WSRTA<date><tt>_B<bbb>.MS`
    OnlineTwoDigit,
    /// `<online>/WSRTA<date><ttt>/WSRTA<date><ttt>_B<bbb>.MS`
    OnlineThreeDigit,
    /// `<ingest>/<date><ttt>/WSRTA<date><ttt>_B<bbb>.MS`
    Ingest,
    /// `<staged>/<date><ttt>/WSRTA<date><ttt>_B<bbb>.MS.tar`
    StagedTarball,
    /// `<cold>/<date><ttt>/WSRTA<date><ttt>_B<bbb>.MS`
    Cold,
}

impl Layout {
    pub fn tier(self) -> ArchiveTier {
        match self {
            Layout::OnlineTwoDigit | Layout::OnlineThreeDigit => ArchiveTier::Online,
            Layout::Ingest => ArchiveTier::Ingest,
            Layout::StagedTarball => ArchiveTier::Staged,
            Layout::Cold => ArchiveTier::Cold,
        }
    }

    pub fn kind(self) -> LocationKind {
        match self {
            Layout::StagedTarball => LocationKind::Tarball,
            _ => LocationKind::Directory,
        }
    }

    pub fn path(self, roots: &ArchiveRoots, key: &ObservationKey) -> String {
        let (date, task, beam) = (key.date, key.task_id, key.beam_id);
        match self {
            Layout::OnlineTwoDigit => format!(
                "{root}/WSRTA{date}{task:02}/WSRTA{date}{task:02}_B{beam:03}.MS",
                root = roots.online
            ),
            Layout::OnlineThreeDigit => format!(
                "{root}/WSRTA{date}{task:03}/WSRTA{date}{task:03}_B{beam:03}.MS",
                root = roots.online
            ),
            Layout::Ingest => format!(
                "{root}/{date}{task:03}/WSRTA{date}{task:03}_B{beam:03}.MS",
                root = roots.ingest
            ),
            Layout::StagedTarball => format!(
                "{root}/{date}{task:03}/WSRTA{date}{task:03}_B{beam:03}.MS.tar",
                root = roots.staged
            ),
            Layout::Cold => format!(
                "{root}/{date}{task:03}/WSRTA{date}{task:03}_B{beam:03}.MS",
                root = roots.cold
            ),
        }
    }

    pub fn locate(self, roots: &ArchiveRoots, key: &ObservationKey) -> ArchiveLocation {
        ArchiveLocation {
            path: self.path(roots, key),
            kind: self.kind(),
            tier: self.tier(),
        }
    }
}

/// Facts a rule can look at
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub key: &'a ObservationKey,
    pub force_legacy: bool,
    pub staged_exists: bool,
    pub ingest_exceptions: &'a [IngestException],
}

/// One entry of the location policy
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&RuleInput<'_>) -> bool,
    pub layout: Layout,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .finish()
    }
}

fn before_two_digit_cutover(input: &RuleInput<'_>) -> bool {
    input.key.date.value() < TWO_DIGIT_CUTOVER
}

fn before_online_cutover_or_forced(input: &RuleInput<'_>) -> bool {
    input.key.date.value() < ONLINE_CUTOVER || input.force_legacy
}

fn is_ingest_exception(input: &RuleInput<'_>) -> bool {
    input
        .ingest_exceptions
        .iter()
        .any(|e| e.date == input.key.date.value() && e.task_id == input.key.task_id)
}

fn staged_tarball_present(input: &RuleInput<'_>) -> bool {
    input.staged_exists
}

/// The location rules in precedence order
pub const RULES: &[Rule] = &[
    Rule {
        name: "two-digit-online",
        applies: before_two_digit_cutover,
        layout: Layout::OnlineTwoDigit,
    },
    Rule {
        name: "three-digit-online",
        applies: before_online_cutover_or_forced,
        layout: Layout::OnlineThreeDigit,
    },
    Rule {
        name: "ingest-exception",
        applies: is_ingest_exception,
        layout: Layout::Ingest,
    },
    Rule {
        name: "staged-tarball",
        applies: staged_tarball_present,
        layout: Layout::StagedTarball,
    },
];

/// Layout used when no rule applies
pub const FALLBACK_LAYOUT: Layout = Layout::Cold;

/// Pure part of the policy: roots, exceptions and the rule table
#[derive(Debug, Clone)]
pub struct ArchivePolicy {
    roots: ArchiveRoots,
    ingest_exceptions: Vec<IngestException>,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self::new(ArchiveRoots::default(), default_ingest_exceptions())
    }
}

impl ArchivePolicy {
    pub fn new(roots: ArchiveRoots, ingest_exceptions: Vec<IngestException>) -> Self {
        Self {
            roots,
            ingest_exceptions,
        }
    }

    pub fn roots(&self) -> &ArchiveRoots {
        &self.roots
    }

    /// Path probed to learn whether a staged tarball exists
    pub fn staged_candidate(&self, key: &ObservationKey) -> String {
        Layout::StagedTarball.path(&self.roots, key)
    }

    /// First matching rule, or `None` for the fallback
    pub fn matching_rule(
        &self,
        key: &ObservationKey,
        force_legacy: bool,
        staged_exists: bool,
    ) -> Option<&'static Rule> {
        let input = RuleInput {
            key,
            force_legacy,
            staged_exists,
            ingest_exceptions: &self.ingest_exceptions,
        };
        RULES.iter().find(|rule| (rule.applies)(&input))
    }

    /// Choose a location given the staged-tier probe result
    pub fn select(
        &self,
        key: &ObservationKey,
        force_legacy: bool,
        staged_exists: bool,
    ) -> ArchiveLocation {
        let layout = self
            .matching_rule(key, force_legacy, staged_exists)
            .map(|rule| rule.layout)
            .unwrap_or(FALLBACK_LAYOUT);
        layout.locate(&self.roots, key)
    }
}

/// Resolves observation keys to archive locations using a live probe
pub struct PathResolver {
    policy: ArchivePolicy,
    probe: Arc<dyn TierProbe>,
}

impl PathResolver {
    pub fn new(policy: ArchivePolicy, probe: Arc<dyn TierProbe>) -> Self {
        Self { policy, probe }
    }

    pub fn policy(&self) -> &ArchivePolicy {
        &self.policy
    }

    /// Resolve where `key` currently lives.
    ///
    /// Always issues exactly one probe, for the staged tarball, even when an
    /// earlier rule decides the outcome. Probe errors are returned as-is.
    pub async fn resolve(
        &self,
        key: &ObservationKey,
        force_legacy: bool,
    ) -> Result<ArchiveLocation, FetchError> {
        let candidate = self.policy.staged_candidate(key);
        let staged_exists = self.probe.exists(&candidate).await?;

        let location = self.policy.select(key, force_legacy, staged_exists);
        debug!(
            %key,
            staged_exists,
            tier = %location.tier,
            path = %location.path,
            "Resolved archive location"
        );
        Ok(location)
    }

    /// Whether the location `key` resolves to actually exists
    pub async fn is_available(&self, key: &ObservationKey) -> Result<bool, FetchError> {
        let location = self.resolve(key, false).await?;
        self.probe.exists(&location.path).await
    }
}
