//! Command-line parsing for `beamlinex`.
//!
//! Argument parsing and scan-id parsing live here; [`crate::app`] does the
//! dispatch.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::analysis::StudyName;
use crate::analysis::images::DEFAULT_PATTERN;
use crate::domain::{Beamline, CurrentMode, NormMode, ScanRef, TimestampMode};
use crate::error::AppError;
use crate::io::SRW_HEADER_ROWS;
use crate::math::{EnergyConversion, Material};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "beamlinex",
    version,
    about = "Fetch, analyze and plot NSLS-II beamline scans"
)]
pub struct Cli {
    /// More log output (`-v` info, `-vv` debug). `RUST_LOG` takes precedence.
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Beamline registry JSON (defaults to the built-in one).
    #[arg(long, value_name = "JSON", global = true)]
    pub config: Option<PathBuf>,

    /// Read scans from exported JSON files instead of the Tiled server.
    #[arg(long, value_name = "DIR", global = true)]
    pub source_dir: Option<PathBuf>,

    /// Directory for plots and data files.
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".", global = true)]
    pub output_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plot one or more scans with their FWHM.
    Plot(PlotArgs),
    /// Save scan tables (and a plot of each scan).
    Save(SaveArgs),
    /// Print the FWHM of scans without writing files.
    Fwhm(FwhmArgs),
    /// FWHM as a function of the ring current.
    Current(CurrentArgs),
    /// Linear and quadratic fits of a parameter study.
    Fit(FitArgs),
    /// Compare a measured spectrum with simulated ones (cosine distance).
    Compare(CompareArgs),
    /// Heatmaps of a 2D raster scan.
    Images(ImagesArgs),
}

#[derive(Debug, Args, Clone)]
pub struct BeamlineArg {
    /// Beamline (CHX, SMI, SRX).
    #[arg(short = 'b', long, value_enum, ignore_case = true)]
    pub beamline: Beamline,
}

/// Column selection and x-axis conversion.
#[derive(Debug, Args, Clone)]
pub struct AxisArgs {
    /// x column (defaults to the beamline's).
    #[arg(short = 'x', long)]
    pub x_label: Option<String>,

    /// y column (defaults to the beamline's).
    #[arg(short = 'y', long)]
    pub y_label: Option<String>,

    #[arg(long)]
    pub x_units: Option<String>,

    #[arg(long)]
    pub y_units: Option<String>,

    /// Convert the x column (Bragg angle, deg) to photon energy (eV).
    #[arg(short = 'e', long)]
    pub convert_to_energy: bool,

    /// Monochromator crystal used for the energy conversion.
    #[arg(long, value_enum, default_value_t = Material::Si111Cryo)]
    pub material: Material,

    /// Offset (deg) added to the Bragg angle before conversion.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub delta_bragg: f64,

    /// d-spacing (Å) overriding the material's.
    #[arg(long)]
    pub d_spacing: Option<f64>,
}

impl AxisArgs {
    pub fn conversion(&self) -> Option<EnergyConversion> {
        self.convert_to_energy.then_some(EnergyConversion {
            material: self.material,
            d_spacing: self.d_spacing,
        })
    }
}

/// Plot appearance and output naming.
#[derive(Debug, Args, Clone)]
pub struct PlotStyleArgs {
    /// Normalize intensities.
    #[arg(short = 'n', long, value_enum)]
    pub norm: Option<NormMode>,

    /// Embed a timestamp in file names.
    #[arg(short = 't', long, value_enum)]
    pub timestamp: Option<TimestampMode>,

    /// Graph file extension (png or svg).
    #[arg(short = 'g', long, default_value = "png")]
    pub graph_extension: String,

    /// Also print an ASCII preview.
    #[arg(long)]
    pub ascii: bool,

    /// ASCII preview width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// ASCII preview height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Scans given as a list or an inclusive `first:last` range.
#[derive(Debug, Args, Clone)]
pub struct ScanListArgs {
    /// Scan ids or uids; negative values count back from the latest scan.
    #[arg(short = 's', long = "scans", num_args = 0.., allow_negative_numbers = true)]
    pub scans: Vec<String>,

    /// Inclusive scan id range `first:last`.
    #[arg(short = 'r', long, conflicts_with = "scans")]
    pub range: Option<String>,
}

impl ScanListArgs {
    pub fn refs(&self) -> Result<Vec<ScanRef>, AppError> {
        match &self.range {
            Some(range) => Ok(parse_range_ids(range)?.into_iter().map(ScanRef::Id).collect()),
            None => parse_scan_ids(&self.scans),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    #[command(flatten)]
    pub beamline: BeamlineArg,

    /// Scans to plot (defaults to the latest).
    #[arg(short = 'p', long = "plot-ids", num_args = 0.., allow_negative_numbers = true)]
    pub plot_ids: Vec<String>,

    #[command(flatten)]
    pub axis: AxisArgs,

    #[command(flatten)]
    pub style: PlotStyleArgs,
}

#[derive(Debug, Args, Clone)]
pub struct SaveArgs {
    #[command(flatten)]
    pub beamline: BeamlineArg,

    #[command(flatten)]
    pub scans: ScanListArgs,

    /// Columns to save (all by default).
    #[arg(short = 'c', long, num_args = 1..)]
    pub columns: Vec<String>,

    /// Leave out the index column.
    #[arg(short = 'i', long)]
    pub hide_index: bool,

    /// Data file extension (`csv`, `json`, anything else is a text table).
    #[arg(short = 'd', long, default_value = "dat")]
    pub data_extension: String,

    /// Do not plot the saved scans.
    #[arg(long)]
    pub no_plot: bool,

    #[command(flatten)]
    pub axis: AxisArgs,

    #[command(flatten)]
    pub style: PlotStyleArgs,
}

#[derive(Debug, Args, Clone)]
pub struct FwhmArgs {
    #[command(flatten)]
    pub beamline: BeamlineArg,

    #[command(flatten)]
    pub scans: ScanListArgs,

    #[command(flatten)]
    pub axis: AxisArgs,
}

#[derive(Debug, Args, Clone)]
pub struct CurrentArgs {
    #[command(flatten)]
    pub beamline: BeamlineArg,

    #[command(flatten)]
    pub scans: ScanListArgs,

    /// Scan ids to leave out.
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<i64>,

    /// How a scan's ring current is taken from its ring-current column.
    #[arg(long = "current", value_enum, default_value_t = CurrentMode::Mean)]
    pub current_mode: CurrentMode,

    /// Ring currents (mA) given by hand, one per scan.
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub ring_currents: Vec<f64>,

    /// Harmonic shown in the plot title.
    #[arg(long)]
    pub harmonic: Option<String>,

    /// Draw the current axis from the first scan to the last.
    #[arg(long)]
    pub reverse: bool,

    #[command(flatten)]
    pub axis: AxisArgs,

    /// Graph file extension (png or svg).
    #[arg(short = 'g', long, default_value = "png")]
    pub graph_extension: String,

    /// Also print an ASCII preview.
    #[arg(long)]
    pub ascii: bool,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Beamline whose built-in studies to use.
    #[arg(short = 'b', long, value_enum, ignore_case = true, required_unless_present = "input")]
    pub beamline: Option<Beamline>,

    /// Built-in study.
    #[arg(short = 's', long, value_enum, conflicts_with = "input", required_unless_present = "input")]
    pub study: Option<StudyName>,

    /// Study table: first column x, one column per series.
    #[arg(long, value_name = "DAT")]
    pub input: Option<PathBuf>,

    /// x axis label for `--input`.
    #[arg(long, default_value = "x")]
    pub x_label: String,

    /// y axis label for `--input`.
    #[arg(long, default_value = "y")]
    pub y_label: String,

    /// Print the fits without writing plots.
    #[arg(long)]
    pub no_save: bool,

    /// Graph file extension (png or svg).
    #[arg(short = 'g', long, default_value = "png")]
    pub graph_extension: String,

    /// Also print an ASCII preview of every fit.
    #[arg(long)]
    pub ascii: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    /// Measured spectrum (CSV).
    #[arg(short = 'e', long = "exp", value_name = "CSV")]
    pub exp: PathBuf,

    /// Simulated spectrum (SRW .dat).
    #[arg(short = 'c', long = "calc", value_name = "DAT", required_unless_present = "calc_dir")]
    pub calc: Option<PathBuf>,

    /// Directory of simulated spectra (`res_*.dat`).
    #[arg(long, value_name = "DIR", conflicts_with = "calc")]
    pub calc_dir: Option<PathBuf>,

    /// Energy column of the measured spectrum.
    #[arg(short = 'x', long, default_value = "energy_energy")]
    pub x_label: String,

    /// Intensity column of the measured spectrum.
    #[arg(short = 'y', long, default_value = "bpmAD_stats3_total")]
    pub y_label: String,

    /// The measured x column is a Bragg angle (deg) rather than keV.
    #[arg(long)]
    pub convert_to_energy: bool,

    #[arg(long, value_enum, default_value_t = Material::Si111Cryo)]
    pub material: Material,

    #[arg(long)]
    pub d_spacing: Option<f64>,

    /// Header lines of the simulated spectra.
    #[arg(long, default_value_t = SRW_HEADER_ROWS)]
    pub header_rows: usize,

    /// Graph file extension (png or svg).
    #[arg(short = 'g', long, default_value = "png")]
    pub graph_extension: String,
}

impl CompareArgs {
    pub fn conversion(&self) -> Option<EnergyConversion> {
        self.convert_to_energy.then_some(EnergyConversion {
            material: self.material,
            d_spacing: self.d_spacing,
        })
    }
}

#[derive(Debug, Args, Clone)]
pub struct ImagesArgs {
    #[command(flatten)]
    pub beamline: BeamlineArg,

    /// Raster scan (defaults to the latest).
    #[arg(short = 'p', long = "plot-id", default_value = "-1", allow_negative_numbers = true)]
    pub scan: String,

    /// Substring selecting the detector fields.
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pub pattern: String,

    /// Pixels per raster cell.
    #[arg(long, default_value_t = 20)]
    pub cell: u32,

    /// Graph file extension (png or svg).
    #[arg(short = 'g', long, default_value = "png")]
    pub graph_extension: String,
}

/// Scan references from the command line; no ids means the latest scan.
pub fn parse_scan_ids<S: AsRef<str>>(ids: &[S]) -> Result<Vec<ScanRef>, AppError> {
    if ids.is_empty() {
        return Ok(vec![ScanRef::Recent(1)]);
    }
    ids.iter().map(|s| s.as_ref().parse()).collect()
}

/// `first:last` → every id in between, both ends included.
/// Most scans a single `first:last` range may select.
pub const MAX_RANGE_SCANS: u64 = 10_000;

pub fn parse_range_ids(range: &str) -> Result<Vec<i64>, AppError> {
    let bad = || {
        AppError::usage(format!(
            "Incorrect range '{range}': expected two integers 'first:last' with last >= first."
        ))
    };
    let parts: Vec<&str> = range.split(':').collect();
    let [first, last] = parts.as_slice() else {
        return Err(bad());
    };
    let first: i64 = first.trim().parse().map_err(|_| bad())?;
    let last: i64 = last.trim().parse().map_err(|_| bad())?;
    if last < first {
        return Err(bad());
    }
    if last.abs_diff(first) >= MAX_RANGE_SCANS {
        return Err(AppError::usage(format!(
            "Range '{range}' selects more than {MAX_RANGE_SCANS} scans."
        )));
    }
    Ok((first..=last).collect())
}
