//! Linear and quadratic least squares fits.
//!
//! Coefficients are stored highest power first, so a quadratic is
//! `a·x² + b·x + c` with `coefficients = [a, b, c]`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::solve_least_squares;

/// A fitted polynomial and its quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyFit {
    pub coefficients: Vec<f64>,
    pub sse: f64,
    pub rmse: f64,
    pub r_squared: f64,
    pub n: usize,
}

impl PolyFit {
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Evaluate the polynomial at `x` (Horner's scheme).
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients.iter().fold(0.0, |acc, c| acc * x + c)
    }

    /// Position of the extremum of a quadratic (`-b / 2a`).
    pub fn vertex(&self) -> Option<f64> {
        if self.degree() != 2 {
            return None;
        }
        let (a, b) = (self.coefficients[0], self.coefficients[1]);
        if a == 0.0 || !a.is_finite() {
            return None;
        }
        Some(-b / (2.0 * a))
    }
}

/// Fit `y = p(x)` of the given degree.
pub fn fit_polynomial(x: &[f64], y: &[f64], degree: usize) -> Result<PolyFit, AppError> {
    if x.len() != y.len() {
        return Err(AppError::usage(format!(
            "Fit needs x and y of equal length (got {} and {}).",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < degree + 1 {
        return Err(AppError::insufficient(format!(
            "A degree-{degree} fit needs at least {} points, got {n}.",
            degree + 1
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(AppError::usage("Fit input contains non-finite values."));
    }

    let cols = degree + 1;
    let design = DMatrix::from_fn(n, cols, |i, j| x[i].powi((degree - j) as i32));
    let rhs = DVector::from_column_slice(y);

    let beta = solve_least_squares(&design, &rhs)
        .ok_or_else(|| AppError::insufficient("Least squares system is too ill-conditioned."))?;

    let mut fit = PolyFit {
        coefficients: beta.iter().copied().collect(),
        sse: 0.0,
        rmse: 0.0,
        r_squared: 0.0,
        n,
    };

    let mean = y.iter().sum::<f64>() / n as f64;
    let mut sst = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let r = yi - fit.eval(xi);
        fit.sse += r * r;
        sst += (yi - mean).powi(2);
    }
    fit.rmse = (fit.sse / n as f64).sqrt();
    fit.r_squared = if sst > 0.0 { 1.0 - fit.sse / sst } else { 1.0 };

    Ok(fit)
}

pub fn fit_linear(x: &[f64], y: &[f64]) -> Result<PolyFit, AppError> {
    fit_polynomial(x, y, 1)
}

pub fn fit_quadratic(x: &[f64], y: &[f64]) -> Result<PolyFit, AppError> {
    fit_polynomial(x, y, 2)
}

/// `n` evenly spaced points over `[min, max]` (inclusive).
pub fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => (0..n)
            .map(|i| min + (max - min) * i as f64 / (n as f64 - 1.0))
            .collect(),
    }
}

/// `[min - |min|·frac, max + |max|·frac]` over the finite values.
pub fn padded_range(values: &[f64], frac: f64) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values.iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if !(min.is_finite() && max.is_finite()) {
        return None;
    }
    Some((min - min.abs() * frac, max + max.abs() * frac))
}
