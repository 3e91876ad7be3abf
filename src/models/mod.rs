//! Calibration model implementations.
//!
//! Models are implemented as small, pure functions so that fitting and bulk
//! application code can stay generic.

pub mod model;
pub mod photocurve;

pub use model::*;
pub use photocurve::{eval_photocurve, Branch, PhotocurveProblem};
