//! Numerical routines: FWHM, least squares fits, signal helpers and
//! Bragg-angle energy conversion.

pub mod energy;
pub mod fwhm;
pub mod ols;
pub mod poly;
pub mod signal;

pub use energy::*;
pub use fwhm::*;
pub use ols::*;
pub use poly::*;
pub use signal::*;
