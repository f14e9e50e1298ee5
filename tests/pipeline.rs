//! End-to-end runs of the subcommand workflows against in-memory scans.

use std::fs;
use std::path::Path;

use beamlinex::analysis::{CurrentSource, read_study};
use beamlinex::app::pipeline::{
    CompareRequest, CurrentOptions, PlotOptions, SaveOptions, ScanRequest, load_scans, plot_scans, run_compare,
    run_current, run_images, run_study, save_scans,
};
use beamlinex::config::{AxisLabels, Registry};
use beamlinex::data::{EnergyAxis, JsonDirSource, ScanSource};
use beamlinex::domain::{Beamline, Column, CurrentMode, NormMode, Scan, ScanHeader, ScanRef, ScanTable};
use beamlinex::error::AppError;
use beamlinex::io::read_matrix;
use beamlinex::math::linspace;
use tempfile::tempdir;

/// Scans held in memory, resolved the same way the Tiled client does.
struct MemorySource {
    scans: Vec<Scan>,
}

impl ScanSource for MemorySource {
    fn fetch(&self, scan: &ScanRef) -> Result<Scan, AppError> {
        let found = match scan {
            ScanRef::Id(id) => self.scans.iter().find(|s| s.header.scan_id == *id),
            ScanRef::Recent(n) => {
                let mut by_time: Vec<&Scan> = self.scans.iter().collect();
                by_time.sort_by(|a, b| b.header.time.total_cmp(&a.header.time));
                by_time.into_iter().nth(*n as usize - 1)
            }
            ScanRef::Uid(uid) => self.scans.iter().find(|s| s.header.uid.starts_with(uid.as_str())),
        };
        found
            .cloned()
            .ok_or_else(|| AppError::runtime(format!("scan {scan} not found")))
    }
}

fn header(scan_id: i64, shape: Option<Vec<usize>>) -> ScanHeader {
    ScanHeader {
        uid: format!("{:08x}-0000-4000-8000-000000000000", scan_id * 4099),
        scan_id,
        time: 1_700_000_000.0 + scan_id as f64 * 60.0,
        beamline_id: "CHX".into(),
        plan_name: Some("rel_scan".into()),
        shape,
        motors: vec!["dcm_b".into()],
        detectors: vec!["xray_eye1_stats1_total".into()],
    }
}

/// Bragg-angle scan of a Gaussian peak sitting on the given ring current.
fn bragg_scan(scan_id: i64, sigma: f64, current: f64) -> Scan {
    let x = linspace(10.0, 10.2, 81);
    let y: Vec<f64> = x
        .iter()
        .map(|v| 1e4 * (-(v - 10.1f64).powi(2) / (2.0 * sigma * sigma)).exp() + 50.0)
        .collect();
    let n = x.len();
    Scan {
        header: header(scan_id, None),
        table: ScanTable::new(vec![
            Column { name: "time".into(), values: (0..n).map(|i| i as f64).collect() },
            Column { name: "dcm_b".into(), values: x },
            Column { name: "xray_eye1_stats1_total".into(), values: y },
            Column { name: "ring_current".into(), values: vec![current; n] },
        ])
        .unwrap(),
    }
}

fn flat_scan(scan_id: i64) -> Scan {
    let n = 10;
    Scan {
        header: header(scan_id, None),
        table: ScanTable::new(vec![
            Column { name: "dcm_b".into(), values: linspace(10.0, 10.2, n) },
            Column { name: "xray_eye1_stats1_total".into(), values: vec![7.0; n] },
            Column { name: "ring_current".into(), values: vec![300.0; n] },
        ])
        .unwrap(),
    }
}

fn chx_request(refs: Vec<ScanRef>) -> ScanRequest {
    let registry = Registry::builtin().unwrap();
    let defaults = &registry.get(Beamline::Chx).unwrap().default_labels;
    ScanRequest {
        beamline: Beamline::Chx,
        refs,
        labels: AxisLabels::resolve(defaults, None, None, None, None),
        axis: EnergyAxis::default(),
    }
}

fn svg_options() -> PlotOptions {
    PlotOptions {
        norm: Some(NormMode::Individual),
        timestamp: None,
        graph_extension: "svg".into(),
    }
}

#[test]
fn latest_scan_is_plotted_with_its_fwhm() {
    let dir = tempdir().unwrap();
    let source = MemorySource {
        scans: vec![bragg_scan(1, 0.01, 400.0), bragg_scan(2, 0.02, 390.0)],
    };
    let request = chx_request(vec![ScanRef::Recent(1)]);

    let scans = load_scans(&source, &request).unwrap();
    assert_eq!(scans[0].curve.scan_id, 2);
    let width = scans[0].curve.fwhm.as_ref().unwrap().width;
    let expected = 2.0 * (2.0 * 2f64.ln()).sqrt() * 0.02;
    assert!((width - expected).abs() < 2e-3, "fwhm {width} vs {expected}");

    let curves: Vec<_> = scans.into_iter().map(|s| s.curve).collect();
    let path = plot_scans(&curves, &request, &svg_options(), dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap(), "chx_scan_2.svg");
    assert!(path.is_file());
}

#[test]
fn saved_json_scans_can_be_read_back() {
    let dir = tempdir().unwrap();
    let source = MemorySource {
        scans: vec![bragg_scan(565, 0.01, 400.0), bragg_scan(566, 0.012, 398.0)],
    };
    let request = chx_request(vec![ScanRef::Id(565), ScanRef::Id(566)]);
    let scans = load_scans(&source, &request).unwrap();

    let save = SaveOptions {
        columns: vec![],
        index: true,
        data_extension: "json".into(),
        plot: false,
    };
    let written = save_scans(&scans, &request, &save, &svg_options(), dir.path()).unwrap();
    let names: Vec<_> = written.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
    assert_eq!(names, vec!["chx_scan_565.json", "chx_scan_566.json"]);

    let offline = JsonDirSource::new(dir.path()).unwrap();
    let back = offline.fetch(&ScanRef::Id(566)).unwrap();
    assert_eq!(back.header, scans[1].scan.header);
    assert_eq!(
        back.table.column("xray_eye1_stats1_total").unwrap(),
        scans[1].scan.table.column("xray_eye1_stats1_total").unwrap()
    );
    let latest = offline.fetch(&ScanRef::Recent(1)).unwrap();
    assert_eq!(latest.header.scan_id, 566);
}

#[test]
fn selected_columns_are_saved_as_csv_with_index() {
    let dir = tempdir().unwrap();
    let source = MemorySource { scans: vec![bragg_scan(7, 0.01, 400.0)] };
    let request = chx_request(vec![ScanRef::Id(7)]);
    let scans = load_scans(&source, &request).unwrap();

    let save = SaveOptions {
        columns: vec!["xray_eye1_stats1_total".into(), "dcm_b".into()],
        index: true,
        data_extension: "csv".into(),
        plot: false,
    };
    let written = save_scans(&scans, &request, &save, &svg_options(), dir.path()).unwrap();
    let content = fs::read_to_string(&written[0]).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some(",xray_eye1_stats1_total,dcm_b"));
    assert!(lines.next().unwrap().starts_with("0,50"));
    assert_eq!(content.lines().count(), 82);

    let bad = SaveOptions {
        columns: vec!["nope".into()],
        ..save
    };
    let err = save_scans(&scans, &request, &bad, &svg_options(), dir.path()).unwrap_err();
    assert_eq!(err.exit_code(), AppError::USAGE);
}

#[test]
fn fwhm_grows_with_ring_current() {
    let dir = tempdir().unwrap();
    let source = MemorySource {
        scans: vec![
            bragg_scan(10, 0.010, 300.0),
            bragg_scan(11, 0.012, 350.0),
            bragg_scan(12, 0.014, 400.0),
            flat_scan(13),
        ],
    };
    let mut request = chx_request((10..=13).map(ScanRef::Id).collect());
    let scans = load_scans(&source, &request).unwrap();
    let options = CurrentOptions {
        harmonic: Some("7th harmonic".into()),
        reverse: true,
        graph_extension: "svg".into(),
    };

    let run = run_current(
        &scans,
        &request,
        "ring_current",
        &CurrentSource::Column(CurrentMode::Mean),
        &options,
        dir.path(),
    )
    .unwrap();
    assert_eq!(
        run.data_file.file_name().unwrap(),
        "chx_fwhm_vs_current_10_to_13.dat"
    );
    assert_eq!(
        run.plot_file.file_name().unwrap(),
        "chx_fwhm_vs_current_10_to_13_current=mean.svg"
    );
    assert!(run.plot_file.is_file());

    let header = fs::read_to_string(&run.data_file).unwrap();
    assert!(header.starts_with("# ring_current    fwhm\n"));
    let rows = read_matrix(&run.data_file).unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3], vec![300.0, -1.0]);
    let fit = run.table.fit.as_ref().unwrap();
    assert_eq!(fit.n, 3);
    assert!(fit.coefficients[0] > 0.0);

    // Manual currents must match the remaining scans.
    request.exclude(&[13]);
    let scans = load_scans(&source, &request).unwrap();
    let err = run_current(
        &scans,
        &request,
        "ring_current",
        &CurrentSource::Manual(vec![1.0, 2.0]),
        &options,
        dir.path(),
    )
    .unwrap_err();
    assert_eq!(err.exit_code(), AppError::USAGE);
}

#[test]
fn study_from_file_without_plots() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("taper.dat");
    fs::write(&path, "# taper fwhm7 fwhm17\n-10 0.0772 0.0370\n0 0.0760 0.0352\n10 0.0780 0.0371\n20 0.0830 0.0415\n")
        .unwrap();
    let data = read_study(&path, "Taper [um]", "FWHM [deg]").unwrap();

    let run = run_study(&data, None, "svg").unwrap();
    assert!(run.plots.is_empty());
    assert_eq!(run.fits.len(), 2);
    for fit in &run.fits {
        let v = fit.vertex.unwrap();
        assert!((-10.0..10.0).contains(&v), "{}: vertex {v}", fit.name);
    }

    let run = run_study(&data, Some(dir.path()), "svg").unwrap();
    assert!(run.plots.iter().all(|p| p.is_file()));
    assert!(run.plots[1].ends_with("taper_fit_2.svg"));
}

fn write_srw(path: &Path, e_min: f64, e_max: f64, center: f64, sigma: f64) {
    let n = 201;
    let mut out = format!("#Intensity\n#{e_min} #Initial Photon Energy [eV]\n#{e_max} #Final Photon Energy [eV]\n#{n} #Number of points vs Photon Energy\n");
    for _ in 0..6 {
        out.push_str("#0\n");
    }
    for e in linspace(e_min, e_max, n) {
        out.push_str(&format!("{}\n", 2e14 * (-(e - center).powi(2) / (2.0 * sigma * sigma)).exp()));
    }
    fs::write(path, out).unwrap();
}

#[test]
fn comparison_picks_the_closest_simulation() {
    let dir = tempdir().unwrap();
    let exp_path = dir.path().join("srx_scan_40100-cut.csv");
    let mut csv = String::from(",energy_energy,bpmAD_stats3_total\n");
    for (i, e) in linspace(9.0, 9.1, 101).iter().enumerate() {
        let ev = e * 1000.0;
        let y = 5e5 * (-(ev - 9050.0f64).powi(2) / (2.0 * 10.0 * 10.0)).exp();
        csv.push_str(&format!("{i},{e},{y}\n"));
    }
    fs::write(&exp_path, csv).unwrap();

    let sims = dir.path().join("sims");
    fs::create_dir(&sims).unwrap();
    write_srw(&sims.join("res_int_se_1_0.5_a.dat"), 8900.0, 9000.0, 8950.0, 6.0);
    write_srw(&sims.join("res_int_se_1_0.9_a.dat"), 8900.0, 9000.0, 8950.0, 10.0);

    let request = CompareRequest {
        exp_file: exp_path,
        calc_files: beamlinex::analysis::compare::list_calc_files(&sims).unwrap(),
        x_label: "energy_energy".into(),
        y_label: "bpmAD_stats3_total".into(),
        conversion: None,
        header_rows: 10,
        graph_extension: "svg".into(),
    };
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let run = run_compare(&request, &out).unwrap();

    assert!((run.fwhm_exp - 23.548).abs() < 0.1, "fwhm exp {}", run.fwhm_exp);
    assert_eq!(run.results.len(), 2);
    let best = beamlinex::analysis::compare::best_match(&run.results).unwrap();
    assert_eq!(best.energy_spread, 0.9);
    assert!((best.comparison.shift - 100.0).abs() < 0.5);
    assert!(run.summary_plot.as_ref().unwrap().ends_with("cosine_vs_ens.svg"));

    let stem = "srx_scan_40100_res_int_se_1_0.9_a";
    for ext in ["svg", "dat", "csv"] {
        assert!(out.join(format!("{stem}.{ext}")).is_file(), "{stem}.{ext}");
    }
    let table = fs::read_to_string(out.join(format!("{stem}.csv"))).unwrap();
    assert!(table.starts_with(",energy,intensity_calc,intensity_exp\n"));

    assert_eq!(best.plot_file, out.join(format!("{stem}.svg")));
    let line = beamlinex::report::format_comparison(run.fwhm_exp, best);
    assert!(line.contains(&format!("File: {stem}.svg")), "{line}");
}

#[test]
fn comparison_rejects_nan_energy_instead_of_panicking() {
    let dir = tempdir().unwrap();
    let exp_path = dir.path().join("srx_scan_40101.csv");
    let mut csv = String::from(",energy_energy,bpmAD_stats3_total\n");
    for (i, e) in linspace(9.0, 9.1, 11).iter().enumerate() {
        let e = if i == 5 { "nan".to_string() } else { e.to_string() };
        csv.push_str(&format!("{i},{e},{}\n", 1.0 + i as f64));
    }
    fs::write(&exp_path, csv).unwrap();
    let calc = dir.path().join("res_int_se_1_0.5_a.dat");
    write_srw(&calc, 8900.0, 9000.0, 8950.0, 6.0);

    let request = CompareRequest {
        exp_file: exp_path,
        calc_files: vec![calc],
        x_label: "energy_energy".into(),
        y_label: "bpmAD_stats3_total".into(),
        conversion: None,
        header_rows: 10,
        graph_extension: "svg".into(),
    };
    let err = run_compare(&request, dir.path()).unwrap_err();
    assert_eq!(err.exit_code(), AppError::USAGE);
}

#[test]
fn raster_images_are_written_per_detector() {
    let dir = tempdir().unwrap();
    let values: Vec<f64> = (0..12).map(f64::from).collect();
    let scan = Scan {
        header: header(837, Some(vec![3, 4])),
        table: ScanTable::new(vec![
            Column { name: "XBPM1_sumX".into(), values: values.clone() },
            Column { name: "XBPM1_sumY".into(), values: values.iter().rev().copied().collect() },
            Column { name: "dcm_b".into(), values },
        ])
        .unwrap(),
    };

    let written = run_images(&scan, "XBPM", 10, "svg", dir.path()).unwrap();
    assert_eq!(written.len(), 2);
    assert!(written[0].ends_with("XBPM1_sumX.svg"));
    assert!(written.iter().all(|p| p.is_file()));

    let err = run_images(&scan, "eiger", 10, "svg", dir.path()).unwrap_err();
    assert_eq!(err.exit_code(), AppError::USAGE);
}
