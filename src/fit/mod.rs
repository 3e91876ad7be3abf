//! Calibration fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit a single calibration family (`fitter`)
//! - fit both photocurve branches and keep the better one (`photocurve`)
//! - choose the family from the entry point and sample size, then validate
//!   the result (`selection`)

pub mod fitter;
pub mod photocurve;
pub mod selection;

pub use fitter::*;
pub use photocurve::*;
pub use selection::*;
