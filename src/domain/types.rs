//! Shared domain types.
//!
//! A [`Scan`] is an externally-owned, read-only record fetched from the scan
//! database: the start document ([`ScanHeader`]) plus a table of numeric
//! columns ([`ScanTable`]). Everything else here is derived per invocation.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::Fwhm;

/// NSLS-II beamlines known to the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Beamline {
    Chx,
    Smi,
    Srx,
}

impl Beamline {
    pub const ALL: [Beamline; 3] = [Beamline::Chx, Beamline::Smi, Beamline::Srx];

    /// Key used in the beamline registry (`CHX`, `SMI`, ...).
    pub fn key(self) -> &'static str {
        match self {
            Beamline::Chx => "CHX",
            Beamline::Smi => "SMI",
            Beamline::Srx => "SRX",
        }
    }
}

impl fmt::Display for Beamline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// How a scan is addressed on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScanRef {
    /// `scan_id` from the start document (positive integer).
    Id(i64),
    /// n-th most recent scan (`-1` is the latest, `0` is treated as `-1`).
    Recent(u64),
    /// Full or partial hex uid.
    Uid(String),
}

impl FromStr for ScanRef {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Ok(if n > 0 {
                ScanRef::Id(n)
            } else {
                ScanRef::Recent(n.unsigned_abs().max(1))
            });
        }
        let is_uid = s.len() >= 6 && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
        if is_uid {
            return Ok(ScanRef::Uid(s.to_ascii_lowercase()));
        }
        Err(AppError::usage(format!(
            "Incorrect scan id provided: '{s}' (expected an integer or a hex uid)."
        )))
    }
}

impl fmt::Display for ScanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanRef::Id(n) => write!(f, "{n}"),
            ScanRef::Recent(n) => write!(f, "-{n}"),
            ScanRef::Uid(uid) => f.write_str(uid),
        }
    }
}

/// The fields of a scan's start document the tool uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHeader {
    pub uid: String,
    pub scan_id: i64,
    /// Start time, seconds since the Unix epoch.
    pub time: f64,
    #[serde(default)]
    pub beamline_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    /// Raster shape for grid scans (`[rows, cols]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    #[serde(default)]
    pub motors: Vec<String>,
    #[serde(default)]
    pub detectors: Vec<String>,
}

/// A named numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Table of equally long numeric columns, in display order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanTable {
    columns: Vec<Column>,
}

impl ScanTable {
    pub fn new(columns: Vec<Column>) -> Result<Self, AppError> {
        if let Some(first) = columns.first() {
            let n = first.values.len();
            if let Some(bad) = columns.iter().find(|c| c.values.len() != n) {
                return Err(AppError::runtime(format!(
                    "Column '{}' has {} rows, expected {n}.",
                    bad.name,
                    bad.values.len()
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Values of a column, or an error listing the available ones.
    pub fn column(&self, name: &str) -> Result<&[f64], AppError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| self.missing(name))
    }

    pub fn check_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<(), AppError> {
        for name in names {
            if !self.has(name.as_ref()) {
                return Err(self.missing(name.as_ref()));
            }
        }
        Ok(())
    }

    /// Subset of columns in the requested order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<ScanTable, AppError> {
        self.check_columns(names)?;
        let columns = names
            .iter()
            .filter_map(|n| self.columns.iter().find(|c| c.name == n.as_ref()).cloned())
            .collect();
        Ok(ScanTable { columns })
    }

    /// Reorder columns: `time`, then motors, then detectors, then the rest
    /// alphabetically.
    pub fn order_for(mut self, header: &ScanHeader) -> Self {
        let rank = |name: &str| -> (usize, usize) {
            if name == "time" {
                return (0, 0);
            }
            if let Some(i) = header.motors.iter().position(|m| m == name) {
                return (1, i);
            }
            if let Some(i) = header.detectors.iter().position(|d| d == name) {
                return (2, i);
            }
            (3, 0)
        };
        self.columns
            .sort_by(|a, b| rank(&a.name).cmp(&rank(&b.name)).then_with(|| a.name.cmp(&b.name)));
        self
    }

    fn missing(&self, name: &str) -> AppError {
        AppError::usage(format!(
            "{name}: invalid column. Available columns: {}",
            self.names().join(", ")
        ))
    }
}

/// A fetched scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub header: ScanHeader,
    pub table: ScanTable,
}

/// The x/y curve selected from a scan plus its FWHM.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCurve {
    pub scan_id: i64,
    pub uid: String,
    pub beamline_id: String,
    pub time: f64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// `None` when the FWHM could not be computed.
    pub fwhm: Option<Fwhm>,
}

impl ScanCurve {
    /// FWHM value with the `-1` sentinel used in exported tables.
    pub fn fwhm_or_sentinel(&self) -> f64 {
        self.fwhm.as_ref().map(|f| f.width).unwrap_or(FWHM_SENTINEL)
    }
}

/// Written in place of a FWHM that could not be computed.
pub const FWHM_SENTINEL: f64 = -1.0;

/// Plot normalization of the y-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NormMode {
    /// Divide every curve by the maximum over all plotted curves.
    Total,
    /// Divide each curve by its own maximum.
    Individual,
}

/// Which timestamp (if any) to embed into output file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimestampMode {
    /// Start time of the scan.
    Scan,
    /// Wall-clock time of this run.
    Current,
}

/// How a single ring-current value is derived for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CurrentMode {
    /// Mean over the whole scan.
    Mean,
    /// Value at the intensity maximum.
    Peak,
    First,
    Last,
}

impl CurrentMode {
    pub fn label(self) -> &'static str {
        match self {
            CurrentMode::Mean => "mean",
            CurrentMode::Peak => "peak",
            CurrentMode::First => "first",
            CurrentMode::Last => "last",
        }
    }
}
