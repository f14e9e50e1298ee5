//! Full width at half maximum of an intensity curve.
//!
//! The curve is min-max normalized to `[-shift, 1 - shift]`, so with the
//! default `shift = 0.5` the half maximum sits at `y = 0`. Every sign change
//! between consecutive samples is a crossing; its x-position is found by
//! linear interpolation. The width is the distance between the first and the
//! last crossing, so extra crossings caused by noise on the flanks or on top of
//! the peak never shrink the reported width.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Default normalization shift (half maximum).
pub const DEFAULT_SHIFT: f64 = 0.5;

/// FWHM plus every interpolated crossing, in scan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fwhm {
    pub width: f64,
    pub roots: Vec<f64>,
}

/// Min-max normalize `y` and shift it down by `shift`.
///
/// Returns `None` when the input is empty, contains non-finite values or is flat.
pub fn normalize(y: &[f64], shift: f64) -> Option<Vec<f64>> {
    if y.is_empty() || y.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let min = y.iter().copied().fold(f64::INFINITY, f64::min);
    let max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if span <= 0.0 {
        return None;
    }
    Some(y.iter().map(|v| (v - min) / span - shift).collect())
}

/// Compute the FWHM of `y(x)`.
pub fn calc_fwhm(x: &[f64], y: &[f64], shift: f64) -> Result<Fwhm, AppError> {
    if x.len() != y.len() {
        return Err(AppError::usage(format!(
            "FWHM needs x and y of equal length (got {} and {}).",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(AppError::insufficient("FWHM needs at least 2 samples."));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(AppError::usage("FWHM input x contains non-finite values."));
    }
    if !(shift.is_finite() && (0.0..=1.0).contains(&shift)) {
        return Err(AppError::usage(format!("FWHM shift must be within [0, 1], got {shift}.")));
    }

    let y = normalize(y, shift).ok_or_else(|| {
        AppError::insufficient("FWHM input y is flat or contains non-finite values.")
    })?;

    let mut positive = y[0] > 0.0;
    let mut roots = Vec::new();
    for i in 1..y.len() {
        let current = y[i] > 0.0;
        if current != positive {
            let (y0, y1) = (y[i - 1].abs(), y[i].abs());
            roots.push(x[i - 1] + (x[i] - x[i - 1]) / (y1 + y0) * y0);
            positive = current;
        }
    }

    if roots.len() < 2 {
        return Err(AppError::insufficient(format!(
            "Number of roots is less than 2 (found {}).",
            roots.len()
        )));
    }

    let width = (roots[roots.len() - 1] - roots[0]).abs();
    Ok(Fwhm { width, roots })
}
