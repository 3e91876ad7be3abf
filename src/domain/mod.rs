//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - input records (`ControlPoint`, `LightcurvePoint`)
//! - the calibration sum type (`CalibrationModel`) and its file tag (`ModelTag`)
//! - run configuration (`FitConfig`, `ApplyConfig`, `FitMode`)

pub mod types;

pub use types::*;
