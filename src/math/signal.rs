//! Small signal helpers shared by the analyses.

/// Piecewise-linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be increasing. Outside the sampled range the end values are
/// returned (no extrapolation). A NaN query, or a NaN in `xp` that breaks the
/// ordering, yields `NaN`.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len());
    let n = xp.len();
    if n == 0 || x.is_nan() {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    // First index with xp[i] > x; in 1..n for an ordered, NaN-free xp.
    let i = xp.partition_point(|&v| v <= x);
    if i == 0 || i >= n {
        return f64::NAN;
    }
    let (x0, x1) = (xp[i - 1], xp[i]);
    let (f0, f1) = (fp[i - 1], fp[i]);
    if x1 == x0 {
        return f1;
    }
    f0 + (f1 - f0) * (x - x0) / (x1 - x0)
}

/// Interpolate `(xp, fp)` onto every point of `x`.
pub fn interp_all(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    x.iter().map(|&v| interp(v, xp, fp)).collect()
}

/// Cosine distance `1 - u·v / (‖u‖‖v‖)`.
///
/// Returns `NaN` for empty, mismatched or all-zero vectors.
pub fn cosine_distance(u: &[f64], v: &[f64]) -> f64 {
    if u.is_empty() || u.len() != v.len() {
        return f64::NAN;
    }
    let mut dot = 0.0;
    let mut nu = 0.0;
    let mut nv = 0.0;
    for (a, b) in u.iter().zip(v) {
        dot += a * b;
        nu += a * a;
        nv += b * b;
    }
    if nu == 0.0 || nv == 0.0 {
        return f64::NAN;
    }
    1.0 - dot / (nu.sqrt() * nv.sqrt())
}

/// Index of the largest finite value (first one on ties).
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Largest finite value.
pub fn max_finite(values: &[f64]) -> Option<f64> {
    argmax(values).map(|i| values[i])
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
