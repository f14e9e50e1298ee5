//! Measured vs simulated spectra.
//!
//! The simulated spectrum is scaled to the measured maximum and shifted so the
//! peaks line up. The shift is then refined by sweeping it over ±10 % and
//! keeping the candidate with the smallest cosine distance between the
//! measured intensities and the simulated ones interpolated on the measured
//! energy mesh.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::domain::{Column, FWHM_SENTINEL, ScanTable};
use crate::error::AppError;
use crate::io::{Spectrum, read_exp_csv};
use crate::math::{DEFAULT_SHIFT, EnergyConversion, argmax, calc_fwhm, cosine_distance, interp_all, linspace};

/// Number of shift candidates.
pub const SWEEP_STEPS: usize = 10001;
/// Sweep range around the peak-to-peak shift, in percent.
pub const SWEEP_PCT: f64 = 10.0;
/// keV → eV for measured energy columns.
pub const KEV_TO_EV: f64 = 1000.0;

/// Best match between a measured and a simulated spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub cosine: f64,
    /// Offset (eV) added to the simulated energies.
    pub shift: f64,
    /// Scaled, shifted simulation on the measured mesh.
    pub y_calc_on_exp: Vec<f64>,
}

/// Cosine distance between a measured and a simulated spectrum.
pub fn calc_dist(calc: &Spectrum, exp: &Spectrum) -> Result<Comparison, AppError> {
    if calc.x.len() != calc.y.len() || exp.x.len() != exp.y.len() {
        return Err(AppError::usage("Spectrum x and y lengths differ."));
    }
    let exp_peak = argmax(&exp.y)
        .ok_or_else(|| AppError::insufficient("Measured spectrum has no finite intensities."))?;
    let calc_peak = argmax(&calc.y)
        .ok_or_else(|| AppError::insufficient("Simulated spectrum has no finite intensities."))?;
    if calc.y[calc_peak] == 0.0 {
        return Err(AppError::insufficient("Simulated spectrum is zero everywhere."));
    }

    let scale = exp.y[exp_peak] / calc.y[calc_peak];
    let (x_calc, y_calc) = increasing(&calc.x, &calc.y.iter().map(|v| v * scale).collect::<Vec<_>>());
    let shift = exp.x[exp_peak] - calc.x[calc_peak];

    let candidates: Vec<(usize, f64, f64)> = linspace(-SWEEP_PCT, SWEEP_PCT, SWEEP_STEPS)
        .into_par_iter()
        .enumerate()
        .filter_map(|(idx, pct)| {
            let s = shift * (1.0 + pct / 100.0);
            let cosine = cosine_on_mesh(&x_calc, &y_calc, s, exp);
            cosine.is_finite().then_some((idx, s, cosine))
        })
        .collect();

    let mut best = candidates
        .first()
        .copied()
        .ok_or_else(|| AppError::insufficient("Cosine distance is undefined for every shift."))?;
    for &c in &candidates[1..] {
        if c.2 < best.2 || (c.2 == best.2 && c.0 < best.0) {
            best = c;
        }
    }

    let (_, shift, cosine) = best;
    Ok(Comparison {
        cosine,
        shift,
        y_calc_on_exp: on_mesh(&x_calc, &y_calc, shift, &exp.x),
    })
}

fn on_mesh(x_calc: &[f64], y_calc: &[f64], shift: f64, mesh: &[f64]) -> Vec<f64> {
    let shifted: Vec<f64> = x_calc.iter().map(|x| x + shift).collect();
    interp_all(mesh, &shifted, y_calc)
}

fn cosine_on_mesh(x_calc: &[f64], y_calc: &[f64], shift: f64, exp: &Spectrum) -> f64 {
    cosine_distance(&on_mesh(x_calc, y_calc, shift, &exp.x), &exp.y)
}

/// Sort samples by x so interpolation sees an increasing mesh.
fn increasing(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    if x.windows(2).all(|w| w[0] <= w[1]) {
        return (x.to_vec(), y.to_vec());
    }
    let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    pairs.into_iter().unzip()
}

/// Energy spread encoded as the fifth `_`-separated token of a simulation
/// file name (`res_int_se_1_0.9_...dat`); `-1` when absent.
pub fn energy_spread_from_name(path: &Path) -> f64 {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('_').nth(4))
        .and_then(|tok| tok.parse::<f64>().ok())
        .unwrap_or(-1.0)
}

/// `res_*.dat` files of a directory, sorted by name.
pub fn list_calc_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::usage(format!("Failed to list '{}': {e}", dir.display())))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("res_") && n.ends_with(".dat"))
        })
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(AppError::usage(format!("No res_*.dat files in '{}'.", dir.display())));
    }
    Ok(files)
}

/// Read the measured spectrum and bring its x axis to eV.
///
/// Without an energy conversion the column is taken to be in keV.
pub fn load_experiment(
    path: &Path,
    x_label: &str,
    y_label: &str,
    conversion: Option<&EnergyConversion>,
) -> Result<Spectrum, AppError> {
    let mut spectrum = read_exp_csv(path, x_label, y_label)?;
    spectrum.x = match conversion {
        Some(conv) => conv.convert_all(&spectrum.x)?,
        None => spectrum.x.iter().map(|v| v * KEV_TO_EV).collect(),
    };
    Ok(spectrum)
}

/// FWHM with the `-1` sentinel.
pub fn fwhm_or_sentinel(s: &Spectrum) -> f64 {
    calc_fwhm(&s.x, &s.y, DEFAULT_SHIFT)
        .map(|f| f.width)
        .unwrap_or(FWHM_SENTINEL)
}

/// `{measured stem up to the first '-'}_{simulation stem}`
pub fn output_stem(exp_file: &Path, calc_file: &Path) -> String {
    let stem = |p: &Path| {
        p.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string()
    };
    let exp = stem(exp_file);
    let exp = exp.split('-').next().unwrap_or_default();
    format!("{exp}_{}", stem(calc_file))
}

/// Table of the matched spectra: `energy`, `intensity_calc`, `intensity_exp`.
pub fn comparison_table(exp: &Spectrum, cmp: &Comparison) -> Result<ScanTable, AppError> {
    ScanTable::new(vec![
        Column { name: "energy".into(), values: exp.x.clone() },
        Column { name: "intensity_calc".into(), values: cmp.y_calc_on_exp.clone() },
        Column { name: "intensity_exp".into(), values: exp.y.clone() },
    ])
}

/// Result of one simulation file.
#[derive(Debug, Clone, PartialEq)]
pub struct CalcResult {
    pub calc_file: PathBuf,
    /// Comparison figure written for this simulation.
    pub plot_file: PathBuf,
    pub energy_spread: f64,
    pub fwhm_calc: f64,
    pub comparison: Comparison,
}

/// Entry with the smallest cosine distance.
pub fn best_match(results: &[CalcResult]) -> Option<&CalcResult> {
    results
        .iter()
        .filter(|r| r.comparison.cosine.is_finite())
        .min_by(|a, b| a.comparison.cosine.total_cmp(&b.comparison.cosine))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(x: &[f64], center: f64, sigma: f64, amp: f64) -> Vec<f64> {
        x.iter()
            .map(|v| amp * (-(v - center).powi(2) / (2.0 * sigma * sigma)).exp())
            .collect()
    }

    #[test]
    fn recovers_shift_and_scale() {
        let x_exp = linspace(9000.0, 9100.0, 201);
        let exp = Spectrum { y: gaussian(&x_exp, 9050.0, 8.0, 3.0), x: x_exp };
        let x_calc = linspace(8900.0, 9000.0, 401);
        let calc = Spectrum { y: gaussian(&x_calc, 8950.0, 8.0, 1e12), x: x_calc };

        let cmp = calc_dist(&calc, &exp).unwrap();
        assert!((cmp.shift - 100.0).abs() < 0.05, "shift {}", cmp.shift);
        assert!(cmp.cosine < 1e-6, "cosine {}", cmp.cosine);
        let peak = argmax(&cmp.y_calc_on_exp).unwrap();
        assert!((cmp.y_calc_on_exp[peak] - 3.0).abs() < 1e-3);
    }

    #[test]
    fn zero_simulation_is_rejected() {
        let x = linspace(0.0, 1.0, 5);
        let exp = Spectrum { x: x.clone(), y: vec![0.0, 1.0, 2.0, 1.0, 0.0] };
        let calc = Spectrum { x, y: vec![0.0; 5] };
        assert!(calc_dist(&calc, &exp).is_err());
    }

    #[test]
    fn energy_spread_token() {
        assert_eq!(energy_spread_from_name(Path::new("/tmp/res_int_se_1_0.9_x.dat")), 0.9);
        assert_eq!(energy_spread_from_name(Path::new("res_int.dat")), -1.0);
    }

    #[test]
    fn output_stem_uses_exp_prefix() {
        assert_eq!(
            output_stem(Path::new("srx_scan_1-2.csv"), Path::new("dir/res_int_se_1_0.9_a.dat")),
            "srx_scan_1_res_int_se_1_0.9_a"
        );
    }

    #[test]
    fn lists_only_simulation_files() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["res_b.dat", "res_a.dat", "other.dat", "res_c.txt"] {
            fs::write(tmp.path().join(name), "").unwrap();
        }
        let files = list_calc_files(tmp.path()).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["res_a.dat", "res_b.dat"]);
    }
}
