//! `beamlinex` library crate.
//!
//! The binary (`beamlinex`) is a thin wrapper around this library so that
//! the analyses can be tested without spawning processes or reaching the scan
//! database.

pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
