//! Observation identifiers.
//!
//! An observation is addressed by its date (YYMMDD) and task id; each of its
//! compound beams is stored as a separate measurement set.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::error::FetchError;

/// Observation date in YYMMDD form, compared numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ObservationDate(u32);

impl ObservationDate {
    /// Build a date from its YYMMDD integer, checking it is a real calendar day
    pub fn new(yymmdd: u32) -> Result<Self, FetchError> {
        let (yy, mm, dd) = (yymmdd / 10_000, (yymmdd / 100) % 100, yymmdd % 100);
        if yymmdd > 999_999 || NaiveDate::from_ymd_opt(2000 + yy as i32, mm, dd).is_none() {
            return Err(FetchError::InvalidDate {
                value: yymmdd.to_string(),
            });
        }
        Ok(Self(yymmdd))
    }

    /// The raw YYMMDD value
    pub fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for ObservationDate {
    type Error = FetchError;

    fn try_from(yymmdd: u32) -> Result<Self, Self::Error> {
        Self::new(yymmdd)
    }
}

impl From<ObservationDate> for u32 {
    fn from(date: ObservationDate) -> Self {
        date.0
    }
}

impl fmt::Display for ObservationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl FromStr for ObservationDate {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FetchError::InvalidDate {
                value: s.to_string(),
            });
        }
        let value = s.parse().map_err(|_| FetchError::InvalidDate {
            value: s.to_string(),
        })?;
        Self::new(value)
    }
}

/// One beam of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservationKey {
    pub date: ObservationDate,
    pub task_id: u32,
    pub beam_id: u32,
}

impl ObservationKey {
    pub fn new(date: ObservationDate, task_id: u32, beam_id: u32) -> Self {
        Self {
            date,
            task_id,
            beam_id,
        }
    }

    /// Observation name with a three-digit task id, e.g. `WSRTA180316004`
    pub fn observation_name(&self) -> String {
        format!("WSRTA{}{:03}", self.date, self.task_id)
    }

    /// Canonical measurement-set name, e.g. `WSRTA180316004_B012.MS`.
    ///
    /// This is the name of the top-level entry inside a staged tarball and
    /// the default local directory name for a transfer.
    pub fn dataset_name(&self) -> String {
        format!("{}_B{:03}.MS", self.observation_name(), self.beam_id)
    }

    /// Stem shared by the restart-checkpoint files of this key
    pub fn checkpoint_stem(&self) -> String {
        format!("{}_B{:03}-icat", self.observation_name(), self.beam_id)
    }
}

impl fmt::Display for ObservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:03}/B{:03}", self.date, self.task_id, self.beam_id)
    }
}
