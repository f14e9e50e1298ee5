//! Workflows shared by the subcommands.
//!
//! Each function takes an already-built [`ScanSource`] and an output
//! directory, so the whole fetch → analyze → write chain can run against
//! in-memory scans in tests. Printing stays in [`crate::app`].

use std::path::{Path, PathBuf};

use crate::analysis::compare::{
    comparison_table, energy_spread_from_name, fwhm_or_sentinel, load_experiment, output_stem,
};
use crate::analysis::current::TABLE_HEADER;
use crate::analysis::study::plot_file_name;
use crate::analysis::{
    CalcResult, CurrentSource, CurrentTable, SeriesFit, StudyData, calc_dist, fit_study, fwhm_vs_current,
    scan_images,
};
use crate::config::AxisLabels;
use crate::data::{EnergyAxis, LoadedScan, ScanSource, read_scans};
use crate::domain::{Beamline, NormMode, Scan, ScanCurve, ScanRef, TimestampMode};
use crate::error::AppError;
use crate::io::{
    Justify, format_filename, format_text_table, file_timestamp, read_srw_spectrum, save_matrix, save_scan_table,
    scan_label, write_csv_table, write_text,
};
use crate::math::EnergyConversion;
use crate::plot::{
    ComparisonFigure, CosineFigure, CurrentFigure, FitFigure, HeatmapFigure, ScanFigure, axis_label, save_figure,
};

/// x label of a converted axis.
pub const ENERGY_LABEL: &str = "Photon energy";
pub const ENERGY_UNITS: &str = "eV";

/// Which scans to read and how to turn them into curves.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub beamline: Beamline,
    pub refs: Vec<ScanRef>,
    pub labels: AxisLabels,
    pub axis: EnergyAxis,
}

impl ScanRequest {
    /// Units of the x axis (and so of the FWHM) after any conversion.
    pub fn x_units(&self) -> &str {
        if self.axis.conversion.is_some() {
            ENERGY_UNITS
        } else {
            &self.labels.x_units
        }
    }

    /// Axis descriptions as drawn.
    pub fn axis_descriptions(&self) -> (String, String) {
        let l = &self.labels;
        let x = if self.axis.conversion.is_some() {
            axis_label(ENERGY_LABEL, ENERGY_UNITS, Some((&l.x_label, &l.x_units)))
        } else {
            axis_label(&l.x_label, &l.x_units, None)
        };
        (x, axis_label(&l.y_label, &l.y_units, None))
    }

    /// Drop scan ids listed in `exclude`.
    pub fn exclude(&mut self, exclude: &[i64]) {
        self.refs
            .retain(|r| !matches!(r, ScanRef::Id(id) if exclude.contains(id)));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    pub norm: Option<NormMode>,
    pub timestamp: Option<TimestampMode>,
    pub graph_extension: String,
}

pub fn load_scans(source: &dyn ScanSource, request: &ScanRequest) -> Result<Vec<LoadedScan>, AppError> {
    if request.refs.is_empty() {
        return Err(AppError::usage("No scans selected."));
    }
    let scans = read_scans(
        source,
        &request.refs,
        &request.labels.x_label,
        &request.labels.y_label,
        &request.axis,
    )?;
    log::info!("loaded {} scan(s) from {}", scans.len(), request.beamline);
    Ok(scans)
}

/// Plot curves into one figure named after the scan ids.
pub fn plot_scans(
    curves: &[ScanCurve],
    request: &ScanRequest,
    options: &PlotOptions,
    out_dir: &Path,
) -> Result<PathBuf, AppError> {
    let last = curves
        .last()
        .ok_or_else(|| AppError::insufficient("No scans to plot."))?;
    let ids: Vec<i64> = curves.iter().map(|c| c.scan_id).collect();
    let name = format_filename(
        request.beamline.key(),
        &scan_label(&ids),
        &options.graph_extension,
        file_timestamp(options.timestamp, last.time),
    );
    let path = out_dir.join(name);

    let (x_label, y_label) = request.axis_descriptions();
    let figure = ScanFigure {
        curves,
        x_label,
        y_label,
        x_units: request.x_units().to_string(),
        norm: options.norm,
        title: ScanFigure::default_title(curves),
    };
    save_figure(&path, &figure)?;
    Ok(path)
}

/// What to write for every saved scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOptions {
    /// Columns to keep; empty keeps all.
    pub columns: Vec<String>,
    pub index: bool,
    pub data_extension: String,
    pub plot: bool,
}

/// Save each scan's table (and its plot) as a separate file.
pub fn save_scans(
    scans: &[LoadedScan],
    request: &ScanRequest,
    save: &SaveOptions,
    plot: &PlotOptions,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, AppError> {
    let mut written = Vec::new();
    for loaded in scans {
        let header = &loaded.scan.header;
        let table = if save.columns.is_empty() {
            loaded.scan.table.clone()
        } else {
            loaded.scan.table.select(&save.columns)?
        };
        let name = format_filename(
            request.beamline.key(),
            &header.scan_id.to_string(),
            &save.data_extension,
            file_timestamp(plot.timestamp, header.time),
        );
        let path = out_dir.join(name);
        save_scan_table(&path, header, &table, save.index)?;
        log::info!("saved {}", path.display());
        written.push(path);

        if save.plot {
            written.push(plot_scans(std::slice::from_ref(&loaded.curve), request, plot, out_dir)?);
        }
    }
    Ok(written)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentOptions {
    pub harmonic: Option<String>,
    pub reverse: bool,
    pub graph_extension: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentRun {
    pub table: CurrentTable,
    pub data_file: PathBuf,
    pub plot_file: PathBuf,
}

/// FWHM vs ring current: `.dat` table and plot.
pub fn run_current(
    scans: &[LoadedScan],
    request: &ScanRequest,
    ring_column: &str,
    source: &CurrentSource,
    options: &CurrentOptions,
    out_dir: &Path,
) -> Result<CurrentRun, AppError> {
    let table = fwhm_vs_current(scans, ring_column, source)?;
    let stem = table.file_stem(request.beamline.key());

    let data_file = out_dir.join(format!("{stem}.dat"));
    save_matrix(&data_file, Some(TABLE_HEADER), &table.rows())?;
    log::info!("saved {}", data_file.display());

    let plot_file = out_dir.join(format!("{stem}_current={}.{}", table.source, options.graph_extension));
    let title = match &options.harmonic {
        Some(h) => format!("{}: {h}", request.beamline),
        None => request.beamline.to_string(),
    };
    let figure = CurrentFigure {
        table: &table,
        title,
        fwhm_units: request.x_units(),
        reverse: options.reverse,
    };
    save_figure(&plot_file, &figure)?;

    Ok(CurrentRun {
        table,
        data_file,
        plot_file,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudyRun {
    pub fits: Vec<SeriesFit>,
    pub plots: Vec<PathBuf>,
}

/// Fit every series; plot each one unless `out_dir` is `None`.
pub fn run_study(data: &StudyData, out_dir: Option<&Path>, graph_extension: &str) -> Result<StudyRun, AppError> {
    let fits = fit_study(data)?;
    let mut plots = Vec::new();
    if let Some(dir) = out_dir {
        for (i, fit) in fits.iter().enumerate() {
            let path = dir.join(plot_file_name(&data.name, i, graph_extension));
            let figure = FitFigure {
                fit,
                x_label: &data.x_label,
                y_label: &data.y_label,
                title: format!("{}: {}", data.name, fit.name),
            };
            save_figure(&path, &figure)?;
            plots.push(path);
        }
    }
    Ok(StudyRun { fits, plots })
}

/// Inputs of a spectrum comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareRequest {
    pub exp_file: PathBuf,
    pub calc_files: Vec<PathBuf>,
    pub x_label: String,
    pub y_label: String,
    pub conversion: Option<EnergyConversion>,
    pub header_rows: usize,
    pub graph_extension: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareRun {
    pub fwhm_exp: f64,
    pub results: Vec<CalcResult>,
    pub summary_plot: Option<PathBuf>,
}

/// Compare the measured spectrum with every simulation.
///
/// Per simulation this writes `{stem}.png`, `{stem}.dat` and `{stem}.csv`;
/// with several simulations also `cosine_vs_ens.png`.
pub fn run_compare(request: &CompareRequest, out_dir: &Path) -> Result<CompareRun, AppError> {
    let exp = load_experiment(
        &request.exp_file,
        &request.x_label,
        &request.y_label,
        request.conversion.as_ref(),
    )?;
    let fwhm_exp = fwhm_or_sentinel(&exp);
    let exp_name = file_name(&request.exp_file);

    let mut results = Vec::with_capacity(request.calc_files.len());
    for calc_file in &request.calc_files {
        let calc = read_srw_spectrum(calc_file, request.header_rows)?;
        let comparison = calc_dist(&calc, &exp)?;
        log::info!(
            "{}: cosine distance {:.6}, shift {:.3} eV",
            calc_file.display(),
            comparison.cosine,
            comparison.shift
        );

        let stem = output_stem(&request.exp_file, calc_file);
        let calc_name = file_name(calc_file);
        let figure = ComparisonFigure {
            exp: &exp,
            comparison: &comparison,
            exp_name: &exp_name,
            calc_name: &calc_name,
            x_label: "Energy [eV]",
            y_label: &request.y_label,
        };
        let plot_file = out_dir.join(format!("{stem}.{}", request.graph_extension));
        save_figure(&plot_file, &figure)?;

        let table = comparison_table(&exp, &comparison)?;
        write_text(
            &out_dir.join(format!("{stem}.dat")),
            &format_text_table(&table, true, Justify::Right),
        )?;
        write_csv_table(&out_dir.join(format!("{stem}.csv")), &table, true)?;

        results.push(CalcResult {
            calc_file: calc_file.clone(),
            plot_file,
            energy_spread: energy_spread_from_name(calc_file),
            fwhm_calc: fwhm_or_sentinel(&calc),
            comparison,
        });
    }

    let summary_plot = if results.len() > 1 {
        let path = out_dir.join(format!("cosine_vs_ens.{}", request.graph_extension));
        save_figure(&path, &CosineFigure { results: &results })?;
        Some(path)
    } else {
        None
    };

    Ok(CompareRun {
        fwhm_exp,
        results,
        summary_plot,
    })
}

/// Heatmap of every matching detector, saved as `{field}.{ext}`.
pub fn run_images(
    scan: &Scan,
    pattern: &str,
    cell: u32,
    graph_extension: &str,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, AppError> {
    scan_images(scan, pattern)?
        .iter()
        .map(|image| {
            let path = out_dir.join(format!("{}.{graph_extension}", image.field));
            save_figure(&path, &HeatmapFigure { image, cell })?;
            Ok(path)
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Material;

    fn request(conversion: bool) -> ScanRequest {
        ScanRequest {
            beamline: Beamline::Chx,
            refs: vec![ScanRef::Id(1), ScanRef::Id(2), ScanRef::Recent(1)],
            labels: AxisLabels {
                x_label: "dcm_b".into(),
                y_label: "xray_eye1_stats1_total".into(),
                x_units: "deg".into(),
                y_units: "counts".into(),
            },
            axis: EnergyAxis {
                delta_bragg: 0.0,
                conversion: conversion.then_some(EnergyConversion {
                    material: Material::Si111Cryo,
                    d_spacing: None,
                }),
            },
        }
    }

    #[test]
    fn converted_axis_keeps_original_label() {
        let (x, y) = request(true).axis_descriptions();
        assert_eq!(x, "Photon energy [eV] (orig. label: dcm_b [deg])");
        assert_eq!(y, "xray_eye1_stats1_total [counts]");
        assert_eq!(request(true).x_units(), "eV");
        assert_eq!(request(false).axis_descriptions().0, "dcm_b [deg]");
    }

    #[test]
    fn exclude_only_drops_matching_ids() {
        let mut req = request(false);
        req.exclude(&[2]);
        assert_eq!(req.refs, vec![ScanRef::Id(1), ScanRef::Recent(1)]);
    }
}
