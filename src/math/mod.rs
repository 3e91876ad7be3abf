//! Numerical building blocks: linear and nonlinear least squares, statistics.

pub mod lm;
pub mod ols;
pub mod polyfit;
pub mod stats;

pub use lm::*;
pub use ols::*;
pub use polyfit::*;
pub use stats::*;
