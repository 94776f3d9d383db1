//! Partition keys: one (dataset kind, year) unit of remote data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// The two upstream datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Temperature,
    Fire,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Fire => "fire",
        }
    }

    /// Directory name under `bronze/` holding this kind's partition files.
    pub fn bronze_dir(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Fire => "fires",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "temperature" | "temp" => Ok(Self::Temperature),
            "fire" | "fires" => Ok(Self::Fire),
            other => Err(PipelineError::Config(format!(
                "unknown dataset kind '{}'",
                other
            ))),
        }
    }
}

/// One ingestable unit of remote data.
///
/// Ordering is by kind, then year, so sorted partitions of one kind are in
/// ascending year order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Partition {
    pub kind: DatasetKind,
    pub year: i32,
}

impl Partition {
    pub fn new(kind: DatasetKind, year: i32) -> Self {
        Self { kind, year }
    }

    pub fn fire(year: i32) -> Self {
        Self::new(DatasetKind::Fire, year)
    }

    pub fn temperature(year: i32) -> Self {
        Self::new(DatasetKind::Temperature, year)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.year)
    }
}

/// Inclusive range of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawYearRange")]
pub struct YearRange {
    start: i32,
    end: i32,
}

#[derive(Deserialize)]
struct RawYearRange {
    start: i32,
    end: i32,
}

impl TryFrom<RawYearRange> for YearRange {
    type Error = PipelineError;

    fn try_from(raw: RawYearRange) -> Result<Self, Self::Error> {
        YearRange::new(raw.start, raw.end)
    }
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::Config(format!(
                "year range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// A range covering one year.
    pub fn single(year: i32) -> Self {
        Self {
            start: year,
            end: year,
        }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Years in ascending order.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    /// Partitions of `kind` for every year, ascending.
    pub fn partitions(&self, kind: DatasetKind) -> impl Iterator<Item = Partition> {
        self.years().map(move |year| Partition::new(kind, year))
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
