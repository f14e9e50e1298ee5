//! 2D images of raster scans.

use crate::domain::Scan;
use crate::error::AppError;

pub const DEFAULT_PATTERN: &str = "XBPM";

/// One detector reshaped to the raster grid (row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct ScanImage {
    pub field: String,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
}

impl ScanImage {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    /// Finite `(min, max)` of the image.
    pub fn range(&self) -> Option<(f64, f64)> {
        let finite = self.values.iter().copied().filter(|v| v.is_finite());
        let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        (lo <= hi).then_some((lo, hi))
    }
}

/// Images of every column whose name contains `pattern`.
pub fn scan_images(scan: &Scan, pattern: &str) -> Result<Vec<ScanImage>, AppError> {
    let shape = scan.header.shape.as_deref().ok_or_else(|| {
        AppError::usage(format!(
            "Scan {} has no raster shape in its start document.",
            scan.header.scan_id
        ))
    })?;
    let (rows, cols) = match shape {
        [rows, cols] => (*rows, *cols),
        [n] => (1, *n),
        _ => {
            return Err(AppError::usage(format!(
                "Scan {}: unsupported raster shape {shape:?}.",
                scan.header.scan_id
            )));
        }
    };

    let images: Vec<ScanImage> = scan
        .table
        .columns()
        .iter()
        .filter(|c| c.name.contains(pattern))
        .map(|c| {
            if c.values.len() != rows * cols {
                return Err(AppError::usage(format!(
                    "{}: {} values cannot be reshaped to {rows}x{cols}.",
                    c.name,
                    c.values.len()
                )));
            }
            Ok(ScanImage {
                field: c.name.clone(),
                rows,
                cols,
                values: c.values.clone(),
            })
        })
        .collect::<Result<_, _>>()?;

    if images.is_empty() {
        return Err(AppError::usage(format!(
            "No fields match '{pattern}'. Available columns: {}",
            scan.table.names().join(", ")
        )));
    }
    Ok(images)
}
