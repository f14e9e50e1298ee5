//! Linear and quadratic fits of parameter studies.
//!
//! A study is a small table: the first column is the scanned parameter
//! (undulator elevation, taper, simulated FWHM, ...) and each further column is
//! one series measured against it (usually one harmonic). The quadratic's
//! vertex gives the parameter value that minimizes the series.

use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::Beamline;
use crate::error::AppError;
use crate::io::read_matrix;
use crate::math::{PolyFit, fit_linear, fit_quadratic, linspace, padded_range};

/// Points on the fitted curve drawn in study plots.
pub const CURVE_POINTS: usize = 100;
/// Relative margin of the fitted curve beyond the measured parameter range.
pub const CURVE_PADDING: f64 = 0.05;

/// Parameter studies recorded during commissioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum StudyName {
    Elevation,
    Taper,
    SimulationsReg,
    SimulationsBare,
}

impl StudyName {
    pub fn key(self) -> &'static str {
        match self {
            StudyName::Elevation => "elevation",
            StudyName::Taper => "taper",
            StudyName::SimulationsReg => "simulations_reg",
            StudyName::SimulationsBare => "simulations_bare",
        }
    }
}

/// A study table with axis labels.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyData {
    pub name: String,
    pub x_label: String,
    pub y_label: String,
    pub x: Vec<f64>,
    /// `(series name, values)`, one entry per y column.
    pub series: Vec<(String, Vec<f64>)>,
}

/// Fits of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFit {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub linear: PolyFit,
    pub quadratic: PolyFit,
    /// Parameter value at the quadratic's extremum.
    pub vertex: Option<f64>,
    /// Dense grid for drawing the quadratic.
    pub curve_x: Vec<f64>,
    pub curve_y: Vec<f64>,
}

/// Built-in study tables.
pub fn builtin_study(beamline: Beamline, study: StudyName) -> Result<StudyData, AppError> {
    let fwhm_deg = "FWHM [deg]";
    let spread = "Energy spread, 1e-3";
    let (x_label, y_label, names, rows): (&str, &str, Vec<&str>, Vec<Vec<f64>>) = match (beamline, study) {
        (Beamline::Smi, StudyName::Elevation) => (
            "Elevation [mm]",
            fwhm_deg,
            vec!["7th harmonic"],
            // scans 565-574
            vec![
                vec![-0.200, 0.07161],
                vec![-0.150, 0.07109],
                vec![-0.100, 0.06995],
                vec![-0.050, 0.06963],
                vec![0.000, 0.06924],
                vec![0.050, 0.06981],
                vec![0.100, 0.06944],
                vec![0.150, 0.06904],
                vec![0.200, 0.06964],
            ],
        ),
        (Beamline::Smi, StudyName::Taper) => (
            "Taper [µm]",
            fwhm_deg,
            vec!["7th harmonic", "17th harmonic", "18th harmonic"],
            vec![
                vec![18.2, 0.09091, 0.04181, 0.03983],
                vec![8.5, 0.08191, 0.03745, 0.03437],
                vec![0.14, 0.07738, 0.03570, 0.03258],
                vec![-4.8, 0.07652, 0.03510, 0.03274],
                vec![-10.0, 0.07636, 0.03621, 0.03369],
                vec![-15.0, 0.07547, 0.03700, 0.03501],
                vec![-22.0, 0.07720, 0.03715, 0.03800],
            ],
        ),
        (Beamline::Smi, StudyName::SimulationsReg) => (
            "FWHM (reg. lattice) [eV]",
            spread,
            vec!["7th harmonic"],
            vec![
                vec![24.86119, 0.5],
                vec![32.38329, 0.7],
                vec![40.07935, 0.9],
                vec![47.82254, 1.1],
                vec![55.49018, 1.3],
                vec![63.18916, 1.5],
            ],
        ),
        (Beamline::Smi, StudyName::SimulationsBare) => (
            "FWHM (bare lattice) [eV]",
            spread,
            vec!["7th harmonic"],
            vec![
                vec![25.73000, 0.5],
                vec![33.17419, 0.7],
                vec![40.64401, 0.9],
                vec![48.20905, 1.1],
                vec![55.77202, 1.3],
                vec![63.29733, 1.5],
            ],
        ),
        (Beamline::Chx, StudyName::Elevation) => (
            "Elevation [mm]",
            fwhm_deg,
            vec!["7th harmonic", "11th harmonic"],
            vec![
                vec![0.150, 0.06885, 0.04420],
                vec![0.100, 0.06303, 0.03978],
                vec![0.050, 0.05874, 0.03663],
                vec![0.0005, 0.05851, 0.03588],
                vec![-0.0085, 0.05742, 0.03560],
                vec![-0.050, 0.05826, 0.03708],
                vec![-0.100, 0.06067, 0.03840],
                vec![-0.150, 0.06654, 0.04276],
            ],
        ),
        _ => {
            let allowed = match beamline {
                Beamline::Smi => "elevation, taper, simulations_reg, simulations_bare",
                Beamline::Chx => "elevation",
                Beamline::Srx => "none",
            };
            return Err(AppError::usage(format!(
                "{}: incorrect study name for {beamline}. Allowed values: {allowed}",
                study.key()
            )));
        }
    };

    let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    from_rows(study.key(), x_label, y_label, &rows, Some(&names))
}

/// Read a study from a whitespace matrix file (first column is x).
pub fn read_study(path: &Path, x_label: &str, y_label: &str) -> Result<StudyData, AppError> {
    let rows = read_matrix(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("study")
        .to_string();
    from_rows(&name, x_label, y_label, &rows, None)
}

fn from_rows(
    name: &str,
    x_label: &str,
    y_label: &str,
    rows: &[Vec<f64>],
    names: Option<&[String]>,
) -> Result<StudyData, AppError> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if width < 2 {
        return Err(AppError::usage(format!(
            "Study '{name}' needs at least two columns (x and one series)."
        )));
    }
    let x = rows.iter().map(|r| r[0]).collect();
    let series = (1..width)
        .map(|j| {
            let label = names
                .and_then(|n| n.get(j - 1).cloned())
                .unwrap_or_else(|| format!("series {j}"));
            (label, rows.iter().map(|r| r[j]).collect())
        })
        .collect();
    Ok(StudyData {
        name: name.to_string(),
        x_label: x_label.to_string(),
        y_label: y_label.to_string(),
        x,
        series,
    })
}

/// Fit every series of a study.
pub fn fit_study(data: &StudyData) -> Result<Vec<SeriesFit>, AppError> {
    let (lo, hi) = padded_range(&data.x, CURVE_PADDING)
        .ok_or_else(|| AppError::insufficient(format!("Study '{}' has no finite x values.", data.name)))?;
    let curve_x = linspace(lo, hi, CURVE_POINTS);

    data.series
        .iter()
        .map(|(name, y)| -> Result<SeriesFit, AppError> {
            let linear = fit_linear(&data.x, y)?;
            let quadratic = fit_quadratic(&data.x, y)?;
            let vertex = quadratic.vertex();
            let curve_y = curve_x.iter().map(|&v| quadratic.eval(v)).collect();
            log::debug!("{}/{name}: quadratic {:?}", data.name, quadratic.coefficients);
            Ok(SeriesFit {
                name: name.clone(),
                x: data.x.clone(),
                y: y.clone(),
                linear,
                quadratic,
                vertex,
                curve_x: curve_x.clone(),
                curve_y,
            })
        })
        .collect()
}

/// `{study}_fit_{n}.png`, `n` counting series from 1.
pub fn plot_file_name(study: &str, series_index: usize, extension: &str) -> String {
    format!("{study}_fit_{}.{extension}", series_index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_have_named_series() {
        let taper = builtin_study(Beamline::Smi, StudyName::Taper).unwrap();
        assert_eq!(taper.x.len(), 7);
        assert_eq!(taper.series.len(), 3);
        assert_eq!(taper.series[1].0, "17th harmonic");

        let chx = builtin_study(Beamline::Chx, StudyName::Elevation).unwrap();
        assert_eq!(chx.series.len(), 2);
        assert!(builtin_study(Beamline::Chx, StudyName::Taper).is_err());
        assert!(builtin_study(Beamline::Srx, StudyName::Elevation).is_err());
    }

    #[test]
    fn elevation_minimum_is_near_zero() {
        let data = builtin_study(Beamline::Chx, StudyName::Elevation).unwrap();
        let fits = fit_study(&data).unwrap();
        for fit in &fits {
            assert!(fit.quadratic.coefficients[0] > 0.0, "{} opens upward", fit.name);
            let v = fit.vertex.unwrap();
            assert!(v.abs() < 0.05, "{} vertex {v}", fit.name);
            assert_eq!(fit.curve_x.len(), CURVE_POINTS);
        }
        assert!((fits[0].curve_x[0] - (-0.1575)).abs() < 1e-12);
    }

    #[test]
    fn simulations_are_linear() {
        let data = builtin_study(Beamline::Smi, StudyName::SimulationsReg).unwrap();
        let fits = fit_study(&data).unwrap();
        assert!(fits[0].linear.r_squared > 0.999);
    }

    #[test]
    fn reads_study_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gap.dat");
        std::fs::write(&path, "# gap fwhm\n1 3\n2 1\n3 3\n4 9\n").unwrap();
        let data = read_study(&path, "Gap [mm]", "FWHM").unwrap();
        assert_eq!(data.name, "gap");
        let fits = fit_study(&data).unwrap();
        assert!((fits[0].vertex.unwrap() - 2.0).abs() < 1e-9, "{:?}", fits[0].vertex);
        assert_eq!(plot_file_name(&data.name, 0, "png"), "gap_fit_1.png");
    }
}
