//! `mag-calib` library crate.
//!
//! The binary (`magcal`) is a thin wrapper around this library so that:
//!
//! - fitting and bulk application are testable without spawning processes
//! - the calibration model can be fitted in one place and applied in another
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod apply;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
