//! Fetch scans and select their x/y curves.

use crate::data::ScanSource;
use crate::domain::{Scan, ScanCurve, ScanRef};
use crate::error::AppError;
use crate::math::{DEFAULT_SHIFT, EnergyConversion, calc_fwhm};

/// How the x column is transformed before analysis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyAxis {
    /// Offset (degrees) added to the angle column.
    pub delta_bragg: f64,
    /// Convert the (offset) Bragg angle to photon energy in eV.
    pub conversion: Option<EnergyConversion>,
}

impl EnergyAxis {
    pub fn apply(&self, x: &[f64]) -> Result<Vec<f64>, AppError> {
        let shifted: Vec<f64> = x.iter().map(|v| v + self.delta_bragg).collect();
        match &self.conversion {
            Some(conv) => conv.convert_all(&shifted),
            None => Ok(shifted),
        }
    }
}

/// A fetched scan together with the curve selected from it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedScan {
    pub scan: Scan,
    pub curve: ScanCurve,
}

/// Fetch one scan and compute the FWHM of `y_label` over `x_label`.
///
/// A FWHM failure is not an error: the curve keeps `fwhm: None` and the
/// reason is logged.
pub fn read_single_scan(
    source: &dyn ScanSource,
    scan_ref: &ScanRef,
    x_label: &str,
    y_label: &str,
    axis: &EnergyAxis,
) -> Result<LoadedScan, AppError> {
    let scan = source.fetch(scan_ref)?;
    scan.table.check_columns(&[x_label, y_label])?;

    let x = axis.apply(scan.table.column(x_label)?)?;
    let y = scan.table.column(y_label)?.to_vec();

    let fwhm = match calc_fwhm(&x, &y, DEFAULT_SHIFT) {
        Ok(f) => Some(f),
        Err(e) => {
            log::warn!("scan {}: FWHM unavailable: {}", scan.header.scan_id, e.message());
            None
        }
    };

    let curve = ScanCurve {
        scan_id: scan.header.scan_id,
        uid: scan.header.uid.clone(),
        beamline_id: scan.header.beamline_id.clone(),
        time: scan.header.time,
        x,
        y,
        fwhm,
    };
    Ok(LoadedScan { scan, curve })
}

/// [`read_single_scan`] over several references, in order.
pub fn read_scans(
    source: &dyn ScanSource,
    refs: &[ScanRef],
    x_label: &str,
    y_label: &str,
    axis: &EnergyAxis,
) -> Result<Vec<LoadedScan>, AppError> {
    refs.iter()
        .map(|r| read_single_scan(source, r, x_label, y_label, axis))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ScanHeader, ScanTable};
    use crate::math::Material;

    struct OneScan(Scan);

    impl ScanSource for OneScan {
        fn fetch(&self, _scan: &ScanRef) -> Result<Scan, AppError> {
            Ok(self.0.clone())
        }
    }

    fn source(y: &[f64]) -> OneScan {
        let x: Vec<f64> = (0..y.len()).map(|i| 10.0 + i as f64).collect();
        OneScan(Scan {
            header: ScanHeader {
                uid: "abcdef12".into(),
                scan_id: 7,
                time: 0.0,
                beamline_id: "SMI".into(),
                plan_name: None,
                shape: None,
                motors: vec![],
                detectors: vec![],
            },
            table: ScanTable::new(vec![
                Column { name: "bragg".into(), values: x },
                Column { name: "I".into(), values: y.to_vec() },
            ])
            .unwrap(),
        })
    }

    #[test]
    fn computes_fwhm_with_offset() {
        let src = source(&[0.0, 0.0, 1.0, 2.0, 1.0, 0.0, 0.0]);
        let axis = EnergyAxis {
            delta_bragg: 0.5,
            conversion: None,
        };
        let read = read_single_scan(&src, &ScanRef::Id(7), "bragg", "I", &axis).unwrap();
        assert_eq!(read.curve.x[0], 10.5);
        let fwhm = read.curve.fwhm.unwrap();
        assert!((fwhm.width - 2.0).abs() < 1e-12);
    }

    #[test]
    fn monotonic_scan_keeps_sentinel() {
        let src = source(&[0.0, 1.0, 2.0, 3.0]);
        let read = read_single_scan(&src, &ScanRef::Recent(1), "bragg", "I", &EnergyAxis::default())
            .unwrap();
        assert!(read.curve.fwhm.is_none());
        assert_eq!(read.curve.fwhm_or_sentinel(), -1.0);
    }

    #[test]
    fn converts_to_energy_and_rejects_unknown_columns() {
        let src = source(&[0.0, 1.0, 0.0]);
        let axis = EnergyAxis {
            delta_bragg: 0.0,
            conversion: Some(EnergyConversion {
                material: Material::Si111Cryo,
                d_spacing: None,
            }),
        };
        let read = read_single_scan(&src, &ScanRef::Id(7), "bragg", "I", &axis).unwrap();
        // 12.39842 / (2 · 3.13029665 · sin 10°) keV
        assert!((read.curve.x[0] - 11404.9).abs() < 1.0, "{}", read.curve.x[0]);

        let err = read_single_scan(&src, &ScanRef::Id(7), "dcm_b", "I", &axis).unwrap_err();
        assert!(err.message().contains("Available columns"));
    }
}
