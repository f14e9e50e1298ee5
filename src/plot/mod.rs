//! Plot output: PNG/SVG figures and terminal previews.

pub mod ascii;
pub mod charts;

pub use ascii::{AsciiSeries, current_preview, fit_preview, render_ascii_plot, scan_series};
pub use charts::{
    CosineFigure, ComparisonFigure, CurrentFigure, DrawResult, Figure, FitFigure, HeatmapFigure, ScanFigure,
    axis_label, save_figure,
};
