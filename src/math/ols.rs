//! Least squares solver.
//!
//! Polynomial fits are tiny (2–3 columns, a handful of measurements), so we
//! solve them with an SVD. It copes with tall design matrices and with nearly
//! collinear columns, which happen when x values span a very narrow range
//! (e.g. elevations of ±0.2 mm).

use nalgebra::{DMatrix, DVector};

/// Solve `min ‖X β − y‖²` using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() != y.len() || x.nrows() == 0 || x.ncols() == 0 {
        return None;
    }
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
