//! Compact range/list notation for task ids and beams.
//!
//! `"00-04,07,09-12"` expands to `[0, 1, 2, 3, 4, 7, 9, 10, 11, 12]`. Order
//! and duplicates from the input are kept.

use std::fmt;
use std::str::FromStr;

use super::error::RangeError;

/// Largest number of values a single `begin-end` token may expand to
pub const MAX_RANGE_SPAN: u32 = 10_000;

/// How the two ends of a `begin-end` token are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeCompare {
    /// Compare the parsed integers
    #[default]
    Numeric,

    /// Compare the raw token text, as older tooling did.
    ///
    /// Mixed widths behave oddly here: `9-10` is rejected because `"10" < "9"`.
    Lexical,
}

/// Expand a range specification into an ordered list of integers
pub fn parse_range(spec: &str, mode: RangeCompare) -> Result<Vec<u32>, RangeError> {
    let mut values = Vec::new();

    for token in spec.split(',').map(str::trim) {
        match token.split_once('-') {
            Some((begin_text, end_text)) => {
                let begin = parse_number(token, begin_text.trim())?;
                let end = parse_number(token, end_text.trim())?;

                let reversed = match mode {
                    RangeCompare::Numeric => end < begin,
                    RangeCompare::Lexical => end_text.trim() < begin_text.trim(),
                };
                if reversed {
                    return Err(RangeError::InvalidRange {
                        token: token.to_string(),
                    });
                }
                if end.saturating_sub(begin) >= MAX_RANGE_SPAN {
                    return Err(RangeError::Parse {
                        token: token.to_string(),
                        reason: format!("range spans more than {} values", MAX_RANGE_SPAN),
                    });
                }
                // Lexical mode can accept e.g. "10-9"; that expands to nothing
                values.extend(begin..=end);
            }
            None => values.push(parse_number(token, token)?),
        }
    }

    Ok(values)
}

fn parse_number(token: &str, text: &str) -> Result<u32, RangeError> {
    text.parse().map_err(|e: std::num::ParseIntError| RangeError::Parse {
        token: token.to_string(),
        reason: if text.is_empty() {
            "empty number".to_string()
        } else {
            e.to_string()
        },
    })
}

/// A parsed range specification that remembers its source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    text: String,
    values: Vec<u32>,
}

impl RangeSpec {
    pub fn parse(spec: &str, mode: RangeCompare) -> Result<Self, RangeError> {
        Ok(Self {
            text: spec.to_string(),
            values: parse_range(spec, mode)?,
        })
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<u32> {
        self.values
    }
}

impl FromStr for RangeSpec {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, RangeCompare::Numeric)
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
