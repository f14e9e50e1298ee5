//! PNG/SVG figures rendered with Plotters.
//!
//! Every figure implements [`Figure`] against a generic drawing backend, and
//! [`save_figure`] picks `SVGBackend` or `BitMapBackend` from the file
//! extension.

use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::analysis::{CalcResult, Comparison, CurrentTable, ScanImage, SeriesFit};
use crate::domain::{NormMode, ScanCurve};
use crate::error::AppError;
use crate::io::Spectrum;
use crate::math::max_finite;

pub type DrawResult = Result<(), Box<dyn std::error::Error>>;

const FONT: &str = "sans-serif";

/// A figure that can be drawn on any Plotters backend.
pub trait Figure {
    fn size(&self) -> (u32, u32) {
        (1000, 750)
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB::ErrorType: 'static;
}

/// Render a figure to `path`; `svg` gives vector output, bitmap formats otherwise.
pub fn save_figure<F: Figure>(path: &Path, figure: &F) -> Result<(), AppError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let size = figure.size();

    let result: DrawResult = match ext.as_str() {
        "svg" => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            figure.draw(&root).and_then(|()| root.present().map_err(Into::into))
        }
        "png" | "jpg" | "jpeg" | "bmp" => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            figure.draw(&root).and_then(|()| root.present().map_err(Into::into))
        }
        other => {
            return Err(AppError::usage(format!(
                "'{other}': unsupported graph extension (use png or svg)."
            )));
        }
    };

    result.map_err(|e| AppError::runtime(format!("Failed to render '{}': {e}", path.display())))?;
    log::info!("saved {}", path.display());
    Ok(())
}

/// `label [units]`, plus the original axis when it was converted.
pub fn axis_label(label: &str, units: &str, orig: Option<(&str, &str)>) -> String {
    let mut out = if units.is_empty() {
        label.to_string()
    } else {
        format!("{label} [{units}]")
    };
    if let Some((orig_label, orig_units)) = orig {
        if orig_label != label && !orig_units.is_empty() {
            out.push_str(&format!(" (orig. label: {orig_label} [{orig_units}])"));
        }
    }
    out
}

/// Finite bounds of a point cloud, padded by 5 % of the span.
fn bounds<'a>(points: impl IntoIterator<Item = &'a (f64, f64)>) -> (Range<f64>, Range<f64>) {
    let mut x = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y = (f64::INFINITY, f64::NEG_INFINITY);
    for &(px, py) in points {
        if px.is_finite() && py.is_finite() {
            x = (x.0.min(px), x.1.max(px));
            y = (y.0.min(py), y.1.max(py));
        }
    }
    (pad(x), pad(y))
}

fn pad((lo, hi): (f64, f64)) -> Range<f64> {
    if !(lo.is_finite() && hi.is_finite()) {
        return 0.0..1.0;
    }
    let span = hi - lo;
    let margin = if span > 0.0 {
        span * 0.05
    } else {
        lo.abs().max(1.0) * 0.05
    };
    (lo - margin)..(hi + margin)
}

fn color(i: usize) -> RGBAColor {
    Palette99::pick(i).to_rgba()
}

fn draw_legend<'a, DB, X, Y>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<X, Y>>,
) -> DrawResult
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
    X: Ranged<ValueType = f64>,
    Y: Ranged<ValueType = f64>,
{
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font((FONT, 14))
        .draw()?;
    Ok(())
}

/// One or more scans of a beamline, with their FWHM in the legend.
pub struct ScanFigure<'a> {
    pub curves: &'a [ScanCurve],
    pub x_label: String,
    pub y_label: String,
    pub x_units: String,
    pub norm: Option<NormMode>,
    pub title: String,
}

impl ScanFigure<'_> {
    /// `UID:<last uid>` over `scan_id: <ids>`.
    pub fn default_title(curves: &[ScanCurve]) -> String {
        let ids: Vec<String> = curves.iter().map(|c| c.scan_id.to_string()).collect();
        let uid = curves.last().map(|c| c.uid.as_str()).unwrap_or_default();
        format!("UID:{uid}  scan_id: {}", ids.join(", "))
    }

    /// Curves as drawn, after normalization.
    pub fn series(&self) -> Vec<Vec<(f64, f64)>> {
        let total = self
            .curves
            .iter()
            .filter_map(|c| max_finite(&c.y))
            .fold(f64::NEG_INFINITY, f64::max);
        self.curves
            .iter()
            .map(|c| {
                let scale = match self.norm {
                    Some(NormMode::Total) => total,
                    Some(NormMode::Individual) => max_finite(&c.y).unwrap_or(1.0),
                    None => 1.0,
                };
                let scale = if scale.is_finite() && scale != 0.0 { scale } else { 1.0 };
                c.x.iter().zip(&c.y).map(|(&x, &y)| (x, y / scale)).collect()
            })
            .collect()
    }
}

impl Figure for ScanFigure<'_> {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let series = self.series();
        let (xr, yr) = bounds(series.iter().flatten());

        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, (FONT, 18))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(xr, yr)?;

        chart
            .configure_mesh()
            .x_desc(&self.x_label)
            .y_desc(&self.y_label)
            .label_style((FONT, 14))
            .axis_desc_style((FONT, 16))
            .draw()?;

        for (i, (curve, points)) in self.curves.iter().zip(&series).enumerate() {
            let c = color(i);
            chart.draw_series(LineSeries::new(points.iter().copied(), c.stroke_width(1)))?;
            chart
                .draw_series(points.iter().map(|&p| Circle::new(p, 3, c.filled())))?
                .label(format!(
                    "scan_id={}, FWHM={:.5} {}",
                    curve.scan_id,
                    curve.fwhm_or_sentinel(),
                    self.x_units
                ))
                .legend(move |(x, y)| Circle::new((x, y), 4, c.filled()));
        }

        draw_legend(&mut chart)
    }
}

/// Measurements of a study series with the quadratic fit and its vertex.
pub struct FitFigure<'a> {
    pub fit: &'a SeriesFit,
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub title: String,
}

impl Figure for FitFigure<'_> {
    fn size(&self) -> (u32, u32) {
        (900, 700)
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let measured: Vec<(f64, f64)> = self.fit.x.iter().copied().zip(self.fit.y.iter().copied()).collect();
        let curve: Vec<(f64, f64)> = self
            .fit
            .curve_x
            .iter()
            .copied()
            .zip(self.fit.curve_y.iter().copied())
            .collect();
        let (xr, yr) = bounds(measured.iter().chain(&curve));
        let (y_lo, y_hi) = (yr.start, yr.end);

        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, (FONT, 18))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(xr.clone(), yr)?;

        chart
            .configure_mesh()
            .x_desc(self.x_label)
            .y_desc(self.y_label)
            .label_style((FONT, 14))
            .axis_desc_style((FONT, 16))
            .draw()?;

        chart
            .draw_series(measured.iter().map(|&p| Circle::new(p, 4, BLUE.filled())))?
            .label("measurements")
            .legend(|(x, y)| Circle::new((x, y), 4, BLUE.filled()));

        let q = &self.fit.quadratic.coefficients;
        chart
            .draw_series(LineSeries::new(curve, RED.stroke_width(2)))?
            .label(format!("quadratic fit: a={:.6e} b={:.6e} c={:.6e}", q[0], q[1], q[2]))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

        if let Some(v) = self.fit.vertex.filter(|v| xr.contains(v)) {
            chart
                .draw_series(LineSeries::new(vec![(v, y_lo), (v, y_hi)], BLACK.stroke_width(1)))?
                .label(format!("minimum at {v:.5}"))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));
        }

        draw_legend(&mut chart)
    }
}

/// FWHM vs ring current.
pub struct CurrentFigure<'a> {
    pub table: &'a CurrentTable,
    pub title: String,
    pub fwhm_units: &'a str,
    /// Draw the current axis from the first to the last scan's value, even if
    /// that makes it decrease.
    pub reverse: bool,
}

impl Figure for CurrentFigure<'_> {
    fn size(&self) -> (u32, u32) {
        (1200, 750)
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let points: Vec<(f64, f64)> = self
            .table
            .valid()
            .filter_map(|p| p.fwhm.map(|f| (p.ring_current, f)))
            .collect();

        // Reversal plots -current so the axis runs from the first scan to the last.
        let flip = self.reverse
            && match (self.table.points.first(), self.table.points.last()) {
                (Some(a), Some(b)) => a.ring_current > b.ring_current,
                _ => false,
            };
        let sign = if flip { -1.0 } else { 1.0 };
        let shown: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (sign * x, y)).collect();
        let (xr, yr) = bounds(&shown);

        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, (FONT, 20))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(xr.clone(), yr)?;

        chart
            .configure_mesh()
            .x_desc(format!("Ring current [mA] (current={})", self.table.source))
            .y_desc(format!("FWHM [{}]", self.fwhm_units))
            .x_label_formatter(&|v| format!("{:.1}", sign * v))
            .label_style((FONT, 14))
            .axis_desc_style((FONT, 16))
            .draw()?;

        chart.draw_series(shown.iter().map(|&p| Circle::new(p, 6, BLUE.filled())))?;

        if let Some(fit) = &self.table.fit {
            let line = [xr.start, xr.end].map(|x| (x, fit.eval(sign * x)));
            chart
                .draw_series(LineSeries::new(line, RED.stroke_width(1)))?
                .label(format!(
                    "linear fit: {:.4e}·I + {:.4e}",
                    fit.coefficients[0], fit.coefficients[1]
                ))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
            draw_legend(&mut chart)?;
        }
        Ok(())
    }
}

/// Measured spectrum with the matched simulation on top.
pub struct ComparisonFigure<'a> {
    pub exp: &'a Spectrum,
    pub comparison: &'a Comparison,
    pub exp_name: &'a str,
    pub calc_name: &'a str,
    pub x_label: &'a str,
    pub y_label: &'a str,
}

impl Figure for ComparisonFigure<'_> {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let exp: Vec<(f64, f64)> = self.exp.x.iter().copied().zip(self.exp.y.iter().copied()).collect();
        let calc: Vec<(f64, f64)> = self
            .exp
            .x
            .iter()
            .copied()
            .zip(self.comparison.y_calc_on_exp.iter().copied())
            .collect();
        let (xr, yr) = bounds(exp.iter().chain(&calc));

        let mut chart = ChartBuilder::on(root)
            .caption(
                format!(
                    "Cosine distance: {:.6}  offset: {:.3} eV",
                    self.comparison.cosine, self.comparison.shift
                ),
                (FONT, 18),
            )
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(xr, yr)?;

        chart
            .configure_mesh()
            .x_desc(self.x_label)
            .y_desc(self.y_label)
            .label_style((FONT, 14))
            .axis_desc_style((FONT, 16))
            .draw()?;

        chart
            .draw_series(LineSeries::new(calc, BLUE.stroke_width(2)))?
            .label(format!(
                "Calculated data: {} (norm. and interp. to exp.data)",
                self.calc_name
            ))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
        chart
            .draw_series(exp.iter().map(|&p| Circle::new(p, 3, RED.filled())))?
            .label(format!("Experimental data: {}", self.exp_name))
            .legend(|(x, y)| Circle::new((x, y), 3, RED.filled()));

        draw_legend(&mut chart)
    }
}

/// Minimum cosine distance per simulated energy spread.
pub struct CosineFigure<'a> {
    pub results: &'a [CalcResult],
}

impl Figure for CosineFigure<'_> {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let points: Vec<(f64, f64)> = self
            .results
            .iter()
            .map(|r| (r.energy_spread, r.comparison.cosine))
            .collect();
        let (xr, yr) = bounds(&points);
        let title = match crate::analysis::compare::best_match(self.results) {
            Some(best) => format!(
                "Min cosine distance: {:.6} for energy spread: {}",
                best.comparison.cosine, best.energy_spread
            ),
            None => "Cosine distance".to_string(),
        };

        let mut chart = ChartBuilder::on(root)
            .caption(title, (FONT, 18))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(xr, yr)?;

        chart
            .configure_mesh()
            .x_desc("Energy spread, 1e-3")
            .y_desc("Cosine distance")
            .label_style((FONT, 14))
            .axis_desc_style((FONT, 16))
            .draw()?;

        chart.draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(2)))?;
        chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, BLUE.filled())))?;
        Ok(())
    }
}

/// Raster image of one detector, no axes.
pub struct HeatmapFigure<'a> {
    pub image: &'a ScanImage,
    /// Pixels per raster cell.
    pub cell: u32,
}

impl Figure for HeatmapFigure<'_> {
    fn size(&self) -> (u32, u32) {
        let cell = self.cell.max(1);
        (
            (self.image.cols as u32).saturating_mul(cell).max(1),
            (self.image.rows as u32).saturating_mul(cell).max(1),
        )
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB::ErrorType: 'static,
    {
        root.fill(&BLACK)?;
        let img = self.image;
        let (lo, hi) = img.range().unwrap_or((0.0, 1.0));
        let span = if hi > lo { hi - lo } else { 1.0 };

        let mut chart = ChartBuilder::on(root)
            .build_cartesian_2d(0.0..img.cols as f64, 0.0..img.rows as f64)?;
        chart.draw_series((0..img.rows).flat_map(|row| {
            (0..img.cols).map(move |col| {
                let v = img.get(row, col);
                let t = if v.is_finite() { (v - lo) / span } else { 0.0 };
                // Row 0 is drawn at the top.
                let y0 = (img.rows - row) as f64;
                Rectangle::new(
                    [(col as f64, y0), (col as f64 + 1.0, y0 - 1.0)],
                    afmhot(t).filled(),
                )
            })
        }))?;
        Ok(())
    }
}

/// `afmhot` colormap: black through red and yellow to white.
pub fn afmhot(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    RGBColor(channel(2.0 * t), channel(2.0 * t - 0.5), channel(2.0 * t - 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(scan_id: i64, y: &[f64]) -> ScanCurve {
        ScanCurve {
            scan_id,
            uid: format!("uid{scan_id}"),
            beamline_id: "CHX".into(),
            time: 0.0,
            x: (0..y.len()).map(|i| i as f64).collect(),
            y: y.to_vec(),
            fwhm: None,
        }
    }

    fn figure(curves: &[ScanCurve], norm: Option<NormMode>) -> ScanFigure<'_> {
        ScanFigure {
            curves,
            x_label: "x".into(),
            y_label: "y".into(),
            x_units: "deg".into(),
            norm,
            title: ScanFigure::default_title(curves),
        }
    }

    #[test]
    fn normalization_modes() {
        let curves = [curve(1, &[1.0, 2.0]), curve(2, &[2.0, 4.0])];
        let total = figure(&curves, Some(NormMode::Total)).series();
        assert_eq!(total[0], vec![(0.0, 0.25), (1.0, 0.5)]);
        let individual = figure(&curves, Some(NormMode::Individual)).series();
        assert_eq!(individual[0][1].1, 1.0);
        assert_eq!(individual[1][1].1, 1.0);
        let raw = figure(&curves, None).series();
        assert_eq!(raw[1][1].1, 4.0);
    }

    #[test]
    fn title_lists_scans() {
        let curves = [curve(10, &[1.0]), curve(11, &[1.0])];
        assert_eq!(ScanFigure::default_title(&curves), "UID:uid11  scan_id: 10, 11");
    }

    #[test]
    fn axis_labels_mention_original_axis() {
        assert_eq!(axis_label("bragg", "deg", None), "bragg [deg]");
        assert_eq!(
            axis_label("Photon energy", "eV", Some(("bragg", "deg"))),
            "Photon energy [eV] (orig. label: bragg [deg])"
        );
        assert_eq!(axis_label("I", "", None), "I");
    }

    #[test]
    fn afmhot_endpoints() {
        assert_eq!(afmhot(0.0), RGBColor(0, 0, 0));
        assert_eq!(afmhot(1.0), RGBColor(255, 255, 255));
        assert_eq!(afmhot(0.5), RGBColor(255, 128, 0));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let curves = [curve(1, &[0.0, 1.0, 0.0])];
        let err = save_figure(Path::new("out.gif"), &figure(&curves, None)).unwrap_err();
        assert_eq!(err.exit_code(), AppError::USAGE);
    }

    #[test]
    fn writes_svg() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scan.svg");
        let curves = [curve(1, &[0.0, 1.0, 0.0])];
        save_figure(&path, &figure(&curves, Some(NormMode::Total))).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("scan_id=1, FWHM="), "legend entry missing");
    }
}
