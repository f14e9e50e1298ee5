//! Reporting utilities: per-scan FWHM rows and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::ScanCurve;

/// One line of the FWHM report.
#[derive(Debug, Clone, PartialEq)]
pub struct FwhmRow {
    pub scan_id: i64,
    pub uid: String,
    pub time: f64,
    pub fwhm: Option<f64>,
    /// Number of half-maximum crossings found.
    pub crossings: usize,
}

pub fn fwhm_rows(curves: &[ScanCurve]) -> Vec<FwhmRow> {
    curves
        .iter()
        .map(|c| FwhmRow {
            scan_id: c.scan_id,
            uid: c.uid.clone(),
            time: c.time,
            fwhm: c.fwhm.as_ref().map(|f| f.width),
            crossings: c.fwhm.as_ref().map(|f| f.roots.len()).unwrap_or(0),
        })
        .collect()
}

/// `(mean, min, max)` of the FWHMs that could be computed.
pub fn fwhm_stats(rows: &[FwhmRow]) -> Option<(f64, f64, f64)> {
    let values: Vec<f64> = rows.iter().filter_map(|r| r.fwhm).collect();
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((mean, min, max))
}
