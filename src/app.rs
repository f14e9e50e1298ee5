//! Top-level application orchestration.
//!
//! `src/main.rs` only maps the result to an exit code; this module parses the
//! CLI, sets up logging, builds the scan source and dispatches to the
//! workflows in [`pipeline`]. Reports go to stdout, logs to stderr.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use crate::analysis::compare::{best_match, list_calc_files};
use crate::analysis::{CurrentSource, builtin_study, read_study};
use crate::cli::{
    AxisArgs, Cli, Command, CompareArgs, CurrentArgs, FitArgs, FwhmArgs, ImagesArgs, PlotArgs, PlotStyleArgs,
    SaveArgs, parse_scan_ids,
};
use crate::config::{AxisLabels, Registry};
use crate::data::{EnergyAxis, JsonDirSource, ScanSource, TiledClient};
use crate::domain::{Beamline, ScanCurve, ScanRef};
use crate::error::AppError;
use crate::plot::{current_preview, fit_preview, render_ascii_plot, scan_series};
use crate::report;

pub mod pipeline;

use pipeline::{CompareRequest, CurrentOptions, PlotOptions, SaveOptions, ScanRequest};

/// Entry point for the `beamlinex` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ctx = Context::new(&cli)?;

    match cli.command {
        Command::Plot(args) => handle_plot(&ctx, args),
        Command::Save(args) => handle_save(&ctx, args),
        Command::Fwhm(args) => handle_fwhm(&ctx, args),
        Command::Current(args) => handle_current(&ctx, args),
        Command::Fit(args) => handle_fit(&ctx, args),
        Command::Compare(args) => handle_compare(&ctx, args),
        Command::Images(args) => handle_images(&ctx, args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

/// Settings shared by every subcommand.
struct Context {
    registry: Registry,
    source_dir: Option<PathBuf>,
    output_dir: PathBuf,
}

impl Context {
    fn new(cli: &Cli) -> Result<Self, AppError> {
        let registry = Registry::load(cli.config.as_deref())?;
        fs::create_dir_all(&cli.output_dir).map_err(|e| {
            AppError::runtime(format!("Failed to create '{}': {e}", cli.output_dir.display()))
        })?;
        Ok(Self {
            registry,
            source_dir: cli.source_dir.clone(),
            output_dir: cli.output_dir.clone(),
        })
    }

    /// Offline JSON files when `--source-dir` is given, the Tiled server otherwise.
    fn source(&self, beamline: Beamline) -> Result<Box<dyn ScanSource>, AppError> {
        match &self.source_dir {
            Some(dir) => Ok(Box::new(JsonDirSource::new(dir)?)),
            None => {
                let catalog = &self.registry.get(beamline)?.catalog;
                log::debug!("reading {beamline} scans from Tiled catalog '{catalog}'");
                Ok(Box::new(TiledClient::from_env(catalog)?))
            }
        }
    }

    fn request(&self, beamline: Beamline, refs: Vec<ScanRef>, axis: &AxisArgs) -> Result<ScanRequest, AppError> {
        let defaults = &self.registry.get(beamline)?.default_labels;
        Ok(ScanRequest {
            beamline,
            refs,
            labels: AxisLabels::resolve(
                defaults,
                axis.x_label.as_deref(),
                axis.y_label.as_deref(),
                axis.x_units.as_deref(),
                axis.y_units.as_deref(),
            ),
            axis: EnergyAxis {
                delta_bragg: axis.delta_bragg,
                conversion: axis.conversion(),
            },
        })
    }
}

fn plot_options(style: &PlotStyleArgs) -> PlotOptions {
    PlotOptions {
        norm: style.norm,
        timestamp: style.timestamp,
        graph_extension: style.graph_extension.clone(),
    }
}

fn print_preview(curves: &[ScanCurve], request: &ScanRequest, style: &PlotStyleArgs) {
    if style.ascii {
        let labels = &request.labels;
        let plot = render_ascii_plot(
            &scan_series(curves),
            None,
            &labels.x_label,
            &labels.y_label,
            style.width,
            style.height,
        );
        println!("{plot}");
    }
}

fn handle_plot(ctx: &Context, args: PlotArgs) -> Result<(), AppError> {
    let beamline = args.beamline.beamline;
    let request = ctx.request(beamline, parse_scan_ids(&args.plot_ids)?, &args.axis)?;
    let source = ctx.source(beamline)?;
    let curves: Vec<ScanCurve> = pipeline::load_scans(source.as_ref(), &request)?
        .into_iter()
        .map(|s| s.curve)
        .collect();

    println!(
        "{}",
        report::format_fwhm_table(beamline.key(), &report::fwhm_rows(&curves), request.x_units())
    );
    print_preview(&curves, &request, &args.style);

    let path = pipeline::plot_scans(&curves, &request, &plot_options(&args.style), &ctx.output_dir)?;
    println!("Saved plot: {}", path.display());
    Ok(())
}

fn handle_save(ctx: &Context, args: SaveArgs) -> Result<(), AppError> {
    let beamline = args.beamline.beamline;
    let request = ctx.request(beamline, args.scans.refs()?, &args.axis)?;
    let source = ctx.source(beamline)?;
    let scans = pipeline::load_scans(source.as_ref(), &request)?;

    let save = SaveOptions {
        columns: args.columns.clone(),
        index: !args.hide_index,
        data_extension: args.data_extension.clone(),
        plot: !args.no_plot,
    };
    let written = pipeline::save_scans(&scans, &request, &save, &plot_options(&args.style), &ctx.output_dir)?;

    let curves: Vec<ScanCurve> = scans.into_iter().map(|s| s.curve).collect();
    print_preview(&curves, &request, &args.style);
    for path in written {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn handle_fwhm(ctx: &Context, args: FwhmArgs) -> Result<(), AppError> {
    let beamline = args.beamline.beamline;
    let request = ctx.request(beamline, args.scans.refs()?, &args.axis)?;
    let source = ctx.source(beamline)?;
    let curves: Vec<ScanCurve> = pipeline::load_scans(source.as_ref(), &request)?
        .into_iter()
        .map(|s| s.curve)
        .collect();

    print!(
        "{}",
        report::format_fwhm_table(beamline.key(), &report::fwhm_rows(&curves), request.x_units())
    );
    Ok(())
}

fn handle_current(ctx: &Context, args: CurrentArgs) -> Result<(), AppError> {
    let beamline = args.beamline.beamline;
    let mut request = ctx.request(beamline, args.scans.refs()?, &args.axis)?;
    request.exclude(&args.exclude);

    let source = ctx.source(beamline)?;
    let scans = pipeline::load_scans(source.as_ref(), &request)?;
    let ids: Vec<String> = scans.iter().map(|s| s.curve.scan_id.to_string()).collect();
    println!("Scans: {}", ids.join(", "));

    let current = if args.ring_currents.is_empty() {
        CurrentSource::Column(args.current_mode)
    } else {
        CurrentSource::Manual(args.ring_currents.clone())
    };
    let options = CurrentOptions {
        harmonic: args.harmonic.clone(),
        reverse: args.reverse,
        graph_extension: args.graph_extension.clone(),
    };
    let ring_column = &ctx.registry.get(beamline)?.ring_current;
    let run = pipeline::run_current(&scans, &request, ring_column, &current, &options, &ctx.output_dir)?;

    let title = match &args.harmonic {
        Some(h) => format!("{beamline}: {h}"),
        None => beamline.to_string(),
    };
    println!("{}", report::format_current_summary(&title, &run.table, request.x_units()));
    if args.ascii {
        println!("{}", current_preview(&run.table, 100, 25));
    }
    println!("Saved: {}", run.data_file.display());
    println!("Saved: {}", run.plot_file.display());
    Ok(())
}

fn handle_fit(ctx: &Context, args: FitArgs) -> Result<(), AppError> {
    let data = match (&args.input, args.study, args.beamline) {
        (Some(path), _, _) => read_study(path, &args.x_label, &args.y_label)?,
        (None, Some(study), Some(beamline)) => builtin_study(beamline, study)?,
        _ => {
            return Err(AppError::usage(
                "Give a beamline and a built-in study (-b, -s) or a study file (--input).",
            ));
        }
    };

    let out_dir = (!args.no_save).then_some(ctx.output_dir.as_path());
    let run = pipeline::run_study(&data, out_dir, &args.graph_extension)?;

    println!("{}", report::format_study_summary(&data, &run.fits));
    if args.ascii {
        for fit in &run.fits {
            println!("{}", fit_preview(fit, &data.x_label, &data.y_label, 100, 25));
        }
    }
    for path in &run.plots {
        println!("Saved plot: {}", path.display());
    }
    Ok(())
}

fn handle_compare(ctx: &Context, args: CompareArgs) -> Result<(), AppError> {
    let calc_files = match (&args.calc, &args.calc_dir) {
        (Some(file), _) => vec![file.clone()],
        (None, Some(dir)) => list_calc_files(dir)?,
        (None, None) => return Err(AppError::usage("Give a simulated spectrum (-c) or a directory (--calc-dir).")),
    };
    let request = CompareRequest {
        exp_file: args.exp.clone(),
        calc_files,
        x_label: args.x_label.clone(),
        y_label: args.y_label.clone(),
        conversion: args.conversion(),
        header_rows: args.header_rows,
        graph_extension: args.graph_extension.clone(),
    };
    let run = pipeline::run_compare(&request, &ctx.output_dir)?;

    for result in &run.results {
        println!("{}", report::format_comparison(run.fwhm_exp, result));
    }
    if run.results.len() > 1 {
        if let Some(best) = best_match(&run.results) {
            print!("{}", report::format_best_match(best));
        }
    }
    if let Some(path) = &run.summary_plot {
        println!("Saved plot: {}", path.display());
    }
    Ok(())
}

fn handle_images(ctx: &Context, args: ImagesArgs) -> Result<(), AppError> {
    let scan_ref: ScanRef = args.scan.parse()?;
    let scan = ctx.source(args.beamline.beamline)?.fetch(&scan_ref)?;
    let written = pipeline::run_images(
        &scan,
        &args.pattern,
        args.cell,
        &args.graph_extension,
        &ctx.output_dir,
    )?;
    for path in written {
        println!("Saved: {}", path.display());
    }
    Ok(())
}
