//! FWHM as a function of the storage-ring current.
//!
//! Each scan contributes one `(ring_current, fwhm)` row. The current is either
//! derived from the scan's ring-current column or supplied by hand (one value
//! per scan, for runs where the archived current is unreliable).

use crate::data::LoadedScan;
use crate::domain::{CurrentMode, FWHM_SENTINEL};
use crate::error::AppError;
use crate::math::{PolyFit, argmax, fit_linear};

pub const TABLE_HEADER: &str = "ring_current    fwhm";

/// Where ring-current values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentSource {
    Column(CurrentMode),
    Manual(Vec<f64>),
}

impl CurrentSource {
    pub fn label(&self) -> &'static str {
        match self {
            CurrentSource::Column(mode) => mode.label(),
            CurrentSource::Manual(_) => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentPoint {
    pub scan_id: i64,
    pub ring_current: f64,
    /// `None` when the scan's FWHM could not be computed.
    pub fwhm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentTable {
    pub points: Vec<CurrentPoint>,
    pub source: String,
    /// Linear fit of FWHM vs current over the valid points.
    pub fit: Option<PolyFit>,
}

impl CurrentTable {
    /// `{beamline}_fwhm_vs_current_{first}_to_{last}`
    pub fn file_stem(&self, beamline_id: &str) -> String {
        let first = self.points.first().map(|p| p.scan_id).unwrap_or_default();
        let last = self.points.last().map(|p| p.scan_id).unwrap_or_default();
        format!("{}_fwhm_vs_current_{first}_to_{last}", beamline_id.to_lowercase())
    }

    /// Rows as written to the `.dat` file; failed FWHMs become `-1`.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.points
            .iter()
            .map(|p| vec![p.ring_current, p.fwhm.unwrap_or(FWHM_SENTINEL)])
            .collect()
    }

    pub fn valid(&self) -> impl Iterator<Item = &CurrentPoint> {
        self.points.iter().filter(|p| p.fwhm.is_some() && p.ring_current.is_finite())
    }
}

/// Ring current of one scan for the given mode.
pub fn ring_current_of(scan: &LoadedScan, column: &str, mode: CurrentMode) -> Result<f64, AppError> {
    let values = scan.scan.table.column(column)?;
    let id = scan.curve.scan_id;
    let empty = || AppError::insufficient(format!("Scan {id}: no ring current values in '{column}'."));

    match mode {
        CurrentMode::Mean => {
            let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
            crate::math::mean(&finite).ok_or_else(empty)
        }
        CurrentMode::Peak => {
            let idx = argmax(&scan.curve.y).ok_or_else(|| {
                AppError::insufficient(format!("Scan {id}: intensity has no finite values."))
            })?;
            values.get(idx).copied().ok_or_else(empty)
        }
        CurrentMode::First => values.first().copied().ok_or_else(empty),
        CurrentMode::Last => values.last().copied().ok_or_else(empty),
    }
}

/// Build the FWHM-vs-current table for scans in the given order.
pub fn fwhm_vs_current(
    scans: &[LoadedScan],
    ring_column: &str,
    source: &CurrentSource,
) -> Result<CurrentTable, AppError> {
    if scans.is_empty() {
        return Err(AppError::insufficient("No scans to build FWHM vs current from."));
    }
    if let CurrentSource::Manual(currents) = source {
        if currents.len() != scans.len() {
            return Err(AppError::usage(format!(
                "{} ring currents given for {} scans.",
                currents.len(),
                scans.len()
            )));
        }
    }

    let mut points = Vec::with_capacity(scans.len());
    for (i, scan) in scans.iter().enumerate() {
        let ring_current = match source {
            CurrentSource::Column(mode) => ring_current_of(scan, ring_column, *mode)?,
            CurrentSource::Manual(currents) => currents[i],
        };
        points.push(CurrentPoint {
            scan_id: scan.curve.scan_id,
            ring_current,
            fwhm: scan.curve.fwhm.as_ref().map(|f| f.width),
        });
    }

    let mut table = CurrentTable {
        points,
        source: source.label().to_string(),
        fit: None,
    };

    let (xs, ys): (Vec<f64>, Vec<f64>) = table
        .valid()
        .filter_map(|p| p.fwhm.map(|f| (p.ring_current, f)))
        .unzip();
    table.fit = match fit_linear(&xs, &ys) {
        Ok(fit) => Some(fit),
        Err(e) => {
            log::warn!("FWHM vs current: no linear fit: {}", e.message());
            None
        }
    };
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, Scan, ScanCurve, ScanHeader, ScanTable};
    use crate::math::Fwhm;

    fn loaded(scan_id: i64, currents: &[f64], y: &[f64], fwhm: Option<f64>) -> LoadedScan {
        let header = ScanHeader {
            uid: format!("uid{scan_id}"),
            scan_id,
            time: 0.0,
            beamline_id: "SMI".into(),
            plan_name: None,
            shape: None,
            motors: vec![],
            detectors: vec![],
        };
        let table = ScanTable::new(vec![Column {
            name: "ring_current".into(),
            values: currents.to_vec(),
        }])
        .unwrap();
        LoadedScan {
            scan: Scan { header, table },
            curve: ScanCurve {
                scan_id,
                uid: format!("uid{scan_id}"),
                beamline_id: "SMI".into(),
                time: 0.0,
                x: (0..y.len()).map(|i| i as f64).collect(),
                y: y.to_vec(),
                fwhm: fwhm.map(|width| Fwhm { width, roots: vec![0.0, width] }),
            },
        }
    }

    #[test]
    fn current_modes() {
        let s = loaded(1, &[300.0, 301.0, 299.0, 304.0], &[0.0, 1.0, 5.0, 2.0], Some(0.1));
        assert_eq!(ring_current_of(&s, "ring_current", CurrentMode::Mean).unwrap(), 301.0);
        assert_eq!(ring_current_of(&s, "ring_current", CurrentMode::Peak).unwrap(), 299.0);
        assert_eq!(ring_current_of(&s, "ring_current", CurrentMode::First).unwrap(), 300.0);
        assert_eq!(ring_current_of(&s, "ring_current", CurrentMode::Last).unwrap(), 304.0);
        assert!(ring_current_of(&s, "current", CurrentMode::Mean).is_err());
    }

    #[test]
    fn failed_fwhm_is_kept_as_sentinel_and_excluded_from_fit() {
        let scans = vec![
            loaded(10, &[10.0], &[1.0], Some(0.07)),
            loaded(11, &[20.0], &[1.0], None),
            loaded(12, &[30.0], &[1.0], Some(0.08)),
        ];
        let table = fwhm_vs_current(&scans, "ring_current", &CurrentSource::Column(CurrentMode::First)).unwrap();
        assert_eq!(table.rows()[1], vec![20.0, -1.0]);
        assert_eq!(table.file_stem("SMI"), "smi_fwhm_vs_current_10_to_12");
        let fit = table.fit.unwrap();
        assert_eq!(fit.n, 2);
        assert!((fit.coefficients[0] - 0.0005).abs() < 1e-12);
    }

    #[test]
    fn manual_currents_must_match_scan_count() {
        let scans = vec![loaded(1, &[1.0], &[1.0], Some(1.0)), loaded(2, &[1.0], &[1.0], Some(2.0))];
        let err = fwhm_vs_current(&scans, "ring_current", &CurrentSource::Manual(vec![4.4])).unwrap_err();
        assert_eq!(err.exit_code(), AppError::USAGE);

        let table = fwhm_vs_current(&scans, "ring_current", &CurrentSource::Manual(vec![4.4, 9.4])).unwrap();
        assert_eq!(table.source, "manual");
        assert_eq!(table.points[1].ring_current, 9.4);
    }
}
