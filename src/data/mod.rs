//! Scan database access.
//!
//! Scans are read through the [`ScanSource`] trait so the analyses never care
//! where a scan came from:
//!
//! - [`TiledClient`] talks to the beamline's Tiled server over HTTP
//! - [`JsonDirSource`] reads scan JSON files exported earlier (offline use, tests)
//!
//! [`read_scans`] turns fetched scans into x/y curves with their FWHM.

pub mod document;
pub mod json_dir;
pub mod reader;
pub mod tiled;

pub use json_dir::JsonDirSource;
pub use reader::{EnergyAxis, LoadedScan, read_scans, read_single_scan};
pub use tiled::TiledClient;

use crate::domain::{Scan, ScanRef};
use crate::error::AppError;

/// Anything that can resolve a [`ScanRef`] into a [`Scan`].
pub trait ScanSource {
    fn fetch(&self, scan: &ScanRef) -> Result<Scan, AppError>;
}

impl<T: ScanSource + ?Sized> ScanSource for Box<T> {
    fn fetch(&self, scan: &ScanRef) -> Result<Scan, AppError> {
        (**self).fetch(scan)
    }
}
