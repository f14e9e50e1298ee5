//! Analyses built on top of fetched scans and spectra.
//!
//! - FWHM vs ring current (`current`)
//! - parameter-study fits (`study`)
//! - measured vs simulated spectra (`compare`)
//! - raster-scan images (`images`)

pub mod compare;
pub mod current;
pub mod images;
pub mod study;

pub use compare::{CalcResult, Comparison, calc_dist};
pub use current::{CurrentSource, CurrentTable, fwhm_vs_current};
pub use images::{ScanImage, scan_images};
pub use study::{SeriesFit, StudyData, StudyName, builtin_study, fit_study, read_study};
