//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic output:
//! - measured points: one marker per series (`o`, `x`, `+`, ...)
//! - fitted curve: `-` line drawn underneath the points

use crate::analysis::{CurrentTable, SeriesFit};
use crate::domain::ScanCurve;

const MARKERS: [char; 5] = ['o', 'x', '+', '*', '#'];

/// One set of points sharing a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiSeries {
    pub marker: char,
    pub points: Vec<(f64, f64)>,
}

/// Scans as series, cycling through the markers.
pub fn scan_series(curves: &[ScanCurve]) -> Vec<AsciiSeries> {
    curves
        .iter()
        .enumerate()
        .map(|(i, c)| AsciiSeries {
            marker: MARKERS[i % MARKERS.len()],
            points: c.x.iter().copied().zip(c.y.iter().copied()).collect(),
        })
        .collect()
}

/// Study measurements with their quadratic fit.
pub fn fit_preview(fit: &SeriesFit, x_label: &str, y_label: &str, width: usize, height: usize) -> String {
    let points = AsciiSeries {
        marker: 'o',
        points: fit.x.iter().copied().zip(fit.y.iter().copied()).collect(),
    };
    let curve: Vec<(f64, f64)> = fit
        .curve_x
        .iter()
        .copied()
        .zip(fit.curve_y.iter().copied())
        .collect();
    render_ascii_plot(&[points], Some(&curve), x_label, y_label, width, height)
}

/// FWHM vs ring current with the linear fit, if any.
pub fn current_preview(table: &CurrentTable, width: usize, height: usize) -> String {
    let points: Vec<(f64, f64)> = table
        .valid()
        .filter_map(|p| p.fwhm.map(|f| (p.ring_current, f)))
        .collect();
    let curve = table.fit.as_ref().and_then(|fit| {
        let (lo, hi) = x_range(points.iter().copied())?;
        Some(vec![(lo, fit.eval(lo)), (hi, fit.eval(hi))])
    });
    let series = AsciiSeries { marker: 'o', points };
    render_ascii_plot(&[series], curve.as_deref(), "current", "fwhm", width, height)
}

/// Render series (and an optional curve) on a `width`×`height` grid.
pub fn render_ascii_plot(
    series: &[AsciiSeries],
    curve: Option<&[(f64, f64)]>,
    x_label: &str,
    y_label: &str,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let all = || {
        series
            .iter()
            .flat_map(|s| s.points.iter().copied())
            .chain(curve.unwrap_or_default().iter().copied())
    };
    let (x_min, x_max) = x_range(all()).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = y_range(all()).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    if let Some(curve) = curve {
        draw_curve(&mut grid, curve, (x_min, x_max), (y_min, y_max));
    }

    for s in series {
        for &(x, y) in &s.points {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            let col = map_x(x, x_min, x_max, width);
            let row = map_y(y, y_min, y_max, height);
            grid[row][col] = s.marker;
        }
    }

    let mut out = format!(
        "Plot: {x_label}=[{x_min:.4}, {x_max:.4}] | {y_label}=[{y_min:.4}, {y_max:.4}]\n"
    );
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }
    out
}

fn finite_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    (hi > lo).then_some((lo, hi))
}

fn x_range(points: impl Iterator<Item = (f64, f64)>) -> Option<(f64, f64)> {
    finite_bounds(points.map(|p| p.0))
}

fn y_range(points: impl Iterator<Item = (f64, f64)>) -> Option<(f64, f64)> {
    finite_bounds(points.map(|p| p.1))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let pad = ((max - min).abs() * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y_max is row 0
    (height as f64 - 1.0 - u * (height as f64 - 1.0)).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], xr: (f64, f64), yr: (f64, f64)) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve.iter().filter(|(x, y)| x.is_finite() && y.is_finite()) {
        let col = map_x(x, xr.0, xr.1, width);
        let row = map_y(y, yr.0, yr.1, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, '-'),
            None => grid[row][col] = '-',
        }
        prev = Some((col, row));
    }
}

/// Bresenham line that only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let (mut x0, mut y0) = (x0 as isize, y0 as isize);
    let (x1, y1) = (x1 as isize, y1 as isize);

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if let Some(cell) = grid
            .get_mut(y0 as usize)
            .and_then(|row| row.get_mut(x0 as usize))
        {
            if *cell == ' ' {
                *cell = ch;
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
