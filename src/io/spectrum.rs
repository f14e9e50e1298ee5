//! Spectrum readers for the measured-vs-simulated comparison.

use std::fs;
use std::path::Path;

use crate::error::AppError;

/// Header rows of an SRW `.dat` spectrum.
pub const SRW_HEADER_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Read an SRW intensity file.
///
/// Header lines 2..4 carry `#<initial energy>`, `#<final energy>` and
/// `#<number of points>`; the body holds one intensity per line on that
/// evenly spaced energy mesh.
pub fn read_srw_spectrum(path: &Path, header_rows: usize) -> Result<Spectrum, AppError> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::usage(format!("Failed to open '{}': {e}", path.display())))?;
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < header_rows.max(4) {
        return Err(AppError::usage(format!(
            "{}: expected at least {} header rows.",
            path.display(),
            header_rows.max(4)
        )));
    }

    let e_init: f64 = header_value(path, lines[1])?;
    let e_fin: f64 = header_value(path, lines[2])?;
    let n_points: usize = header_value(path, lines[3])?;
    if !(e_init.is_finite() && e_fin.is_finite()) {
        return Err(AppError::usage(format!(
            "{}: energy range [{e_init}, {e_fin}] is not finite.",
            path.display()
        )));
    }

    let mut y = Vec::with_capacity(n_points);
    for (offset, line) in lines[header_rows..].iter().enumerate() {
        let Some(tok) = line.split_whitespace().next() else {
            continue;
        };
        let v = tok.parse::<f64>().map_err(|e| {
            AppError::usage(format!(
                "{}:{}: invalid intensity '{tok}' ({e}).",
                path.display(),
                header_rows + offset + 1
            ))
        })?;
        y.push(v);
    }

    if y.len() != n_points {
        return Err(AppError::usage(format!(
            "{}: number of points {} does not match the length of the read data {}.",
            path.display(),
            n_points,
            y.len()
        )));
    }

    Ok(Spectrum {
        x: crate::math::linspace(e_init, e_fin, n_points),
        y,
    })
}

fn header_value<T>(path: &Path, row: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = row.split('#').nth(1).map(str::trim).unwrap_or_default();
    raw.parse::<T>().map_err(|e| {
        AppError::usage(format!("{}: invalid SRW header row '{row}' ({e}).", path.display()))
    })
}

/// Read two columns of a measured scan exported as CSV by `beamlinex save`.
pub fn read_exp_csv(path: &Path, x_label: &str, y_label: &str) -> Result<Spectrum, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| AppError::usage(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::usage(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let find = |name: &str| {
        headers.iter().position(|h| h.trim_start_matches('\u{feff}') == name).ok_or_else(|| {
            AppError::usage(format!(
                "{name}: invalid column. Available columns: {}",
                headers.iter().filter(|h| !h.is_empty()).collect::<Vec<_>>().join(", ")
            ))
        })
    };
    let (ix, iy) = (find(x_label)?, find(y_label)?);

    let mut spectrum = Spectrum { x: Vec::new(), y: Vec::new() };
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::usage(format!("CSV parse error on line {line}: {e}")))?;
        let parse = |i: usize, name: &str| -> Result<f64, AppError> {
            let raw = record.get(i).unwrap_or_default();
            raw.parse::<f64>().map_err(|_| {
                AppError::usage(format!("Line {line}: invalid {name} value '{raw}'."))
            })
        };
        let x = parse(ix, x_label)?;
        if !x.is_finite() {
            return Err(AppError::usage(format!("Line {line}: {x_label} value {x} is not finite.")));
        }
        spectrum.x.push(x);
        spectrum.y.push(parse(iy, y_label)?);
    }

    if spectrum.x.len() < 2 {
        return Err(AppError::insufficient(format!(
            "{}: at least 2 data rows are required.",
            path.display()
        )));
    }
    Ok(spectrum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srw(n_declared: usize, values: &[f64]) -> String {
        let mut s = String::from("#Intensity [ph/s/.1%bw/mm^2] (C-aligned, inner loop is vs Photon Energy, outer loop vs Horizontal Position, outermost loop vs Vertical Position)\n");
        s.push_str("#9000.0 #Initial Photon Energy [eV]\n");
        s.push_str("#9004.0 #Final Photon Energy [eV]\n");
        s.push_str(&format!("#{n_declared} #Number of points vs Photon Energy\n"));
        for _ in 4..10 {
            s.push_str("#0.0 #Position\n");
        }
        for v in values {
            s.push_str(&format!("{v}\n"));
        }
        s
    }

    #[test]
    fn reads_srw_mesh() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("res_int_se_1.dat");
        fs::write(&path, srw(5, &[1.0, 2.0, 4.0, 2.0, 1.0])).unwrap();
        let s = read_srw_spectrum(&path, SRW_HEADER_ROWS).unwrap();
        assert_eq!(s.x, vec![9000.0, 9001.0, 9002.0, 9003.0, 9004.0]);
        assert_eq!(s.y[2], 4.0);
    }

    #[test]
    fn srw_point_count_must_match() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.dat");
        fs::write(&path, srw(6, &[1.0, 2.0])).unwrap();
        let err = read_srw_spectrum(&path, SRW_HEADER_ROWS).unwrap_err();
        assert!(err.message().contains("does not match"), "{}", err.message());
    }

    #[test]
    fn reads_exported_csv_columns() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("srx_scan_1.csv");
        fs::write(&path, ",energy_energy,bpmAD_stats3_total\n0,9.0,1\n1,9.001,3\n2,9.002,1\n").unwrap();
        let s = read_exp_csv(&path, "energy_energy", "bpmAD_stats3_total").unwrap();
        assert_eq!(s.x, vec![9.0, 9.001, 9.002]);
        assert_eq!(s.y, vec![1.0, 3.0, 1.0]);

        let err = read_exp_csv(&path, "dcm_b", "bpmAD_stats3_total").unwrap_err();
        assert!(err.message().contains("energy_energy, bpmAD_stats3_total"));
    }

    #[test]
    fn non_finite_energies_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let csv_path = tmp.path().join("srx_scan_2.csv");
        fs::write(&csv_path, ",energy_energy,bpmAD_stats3_total\n0,9.0,1\n1,nan,3\n2,9.002,1\n").unwrap();
        let err = read_exp_csv(&csv_path, "energy_energy", "bpmAD_stats3_total").unwrap_err();
        assert_eq!(err.exit_code(), AppError::USAGE);
        assert!(err.message().contains("Line 3"), "{}", err.message());

        let dat_path = tmp.path().join("res_int_se_2.dat");
        fs::write(&dat_path, srw(3, &[1.0, 2.0, 1.0]).replacen("#9000.0", "#nan", 1)).unwrap();
        let err = read_srw_spectrum(&dat_path, SRW_HEADER_ROWS).unwrap_err();
        assert_eq!(err.exit_code(), AppError::USAGE);
    }
}
