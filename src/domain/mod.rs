//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - scan addressing (`ScanRef`) and fetched scans (`Scan`, `ScanHeader`, `ScanTable`)
//! - per-scan derived curves (`ScanCurve`)
//! - option enums shared by the CLI and the analyses (`NormMode`, `CurrentMode`, ...)

pub mod types;

pub use types::*;
