//! Terminal output.
//!
//! All formatting lives here so the analyses stay free of presentation code
//! and output changes stay localized.

use crate::analysis::{CalcResult, CurrentTable, SeriesFit, StudyData};
use crate::domain::FWHM_SENTINEL;
use crate::io::{DISPLAY_TIME_FORMAT, humanize_time};
use crate::report::{FwhmRow, fwhm_stats};

/// FWHM of every scan, failed ones shown as `-1`.
pub fn format_fwhm_table(beamline: &str, rows: &[FwhmRow], units: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {beamline}: FWHM of {} scan(s) ===\n", rows.len()));

    let fwhm_header = format!("fwhm [{units}]");
    out.push_str(
        format!(
            "{:>8} {:<12} {:<19} {:>14} {:>9}\n",
            "scan_id", "uid", "time", fwhm_header, "crossings"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!("{:-<8} {:-<12} {:-<19} {:-<14} {:-<9}\n", "", "", "", "", ""));

    for r in rows {
        out.push_str(
            format!(
                "{:>8} {:<12} {:<19} {:>14} {:>9}\n",
                r.scan_id,
                truncate(&r.uid, 12),
                humanize_time(r.time, DISPLAY_TIME_FORMAT),
                fmt_fwhm(r.fwhm),
                r.crossings,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    if let Some((mean, min, max)) = fwhm_stats(rows) {
        out.push_str(&format!("\nFWHM mean={mean:.5} min={min:.5} max={max:.5} {units}\n"));
    }
    out
}

/// FWHM vs ring current table with the linear fit.
pub fn format_current_summary(title: &str, table: &CurrentTable, units: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== FWHM vs ring current: {title} ===\n"));
    out.push_str(&format!("Ring current: {}\n", table.source));

    let fwhm_header = format!("fwhm [{units}]");
    out.push_str(&format!("{:>8} {:>14} {:>14}\n", "scan_id", "current [mA]", fwhm_header));
    out.push_str(&format!("{:-<8} {:-<14} {:-<14}\n", "", "", ""));
    for p in &table.points {
        out.push_str(&format!(
            "{:>8} {:>14.3} {:>14}\n",
            p.scan_id,
            p.ring_current,
            fmt_fwhm(p.fwhm)
        ));
    }

    out.push('\n');
    match &table.fit {
        Some(fit) => out.push_str(&format!(
            "Linear fit: fwhm = {:.6e} * current + {:.6e} (R²={:.4}, n={})\n",
            fit.coefficients[0], fit.coefficients[1], fit.r_squared, fit.n
        )),
        None => out.push_str("Linear fit: not available (fewer than 2 valid points)\n"),
    }
    out
}

/// Linear and quadratic fits of every series, with the quadratic's minimum.
pub fn format_study_summary(data: &StudyData, fits: &[SeriesFit]) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Study: {} ===\n", data.name));
    out.push_str(&format!("x: {} | y: {}\n", data.x_label, data.y_label));

    for fit in fits {
        out.push_str(&format!("\n{}:\n", fit.name));
        out.push_str(&format!(
            "  linear   : {} R²={:.4}\n",
            fmt_coefficients(&fit.linear.coefficients),
            fit.linear.r_squared
        ));
        out.push_str(&format!(
            "  quadratic: {} R²={:.4}\n",
            fmt_coefficients(&fit.quadratic.coefficients),
            fit.quadratic.r_squared
        ));
        match fit.vertex {
            Some(v) => out.push_str(&format!(
                "  minimum  : x={v:.5} y={:.5}\n",
                fit.quadratic.eval(v)
            )),
            None => out.push_str("  minimum  : none (degenerate quadratic)\n"),
        }
    }
    out
}

/// Result of comparing the measured spectrum with one simulation.
pub fn format_comparison(fwhm_exp: f64, result: &CalcResult) -> String {
    let file = result
        .plot_file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    format!(
        "FWHM exp: {fwhm_exp:.5} eV    FWHM calc: {:.5} eV\nFile: {file}    Cosine distance: {:.6}\n",
        result.fwhm_calc, result.comparison.cosine
    )
}

pub fn format_best_match(best: &CalcResult) -> String {
    format!(
        "Min cosine distance: {:.6} for energy spread: {} (shift {:.3} eV, {})\n",
        best.comparison.cosine,
        best.energy_spread,
        best.comparison.shift,
        best.calc_file.display()
    )
}

fn fmt_fwhm(fwhm: Option<f64>) -> String {
    match fwhm {
        Some(v) => format!("{v:.5}"),
        None => format!("{FWHM_SENTINEL}"),
    }
}

fn fmt_coefficients(c: &[f64]) -> String {
    let names = ["a", "b", "c"];
    c.iter()
        .zip(names)
        .map(|(v, n)| format!("{n}={v:.6e}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
