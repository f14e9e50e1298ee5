//! Input/output helpers.
//!
//! - output file naming and timestamps (`naming`)
//! - scan tables and numeric matrices (`export`)
//! - SRW and measured spectra for comparisons (`spectrum`)

pub mod export;
pub mod naming;
pub mod spectrum;

pub use export::*;
pub use naming::*;
pub use spectrum::*;
