//! Input/output helpers.
//!
//! - control-point reader (`control`)
//! - parameter file codec (`params`)
//! - lightcurve line codec (`lightcurve`)
//! - scoped atomic file rewrite (`atomic`)
//! - summary log limiting magnitude (`summary`)
//! - fit report JSON (`report`)

pub mod atomic;
pub mod control;
pub mod lightcurve;
pub mod params;
pub mod report;
pub mod summary;

pub use atomic::*;
pub use control::*;
pub use lightcurve::*;
pub use params::*;
pub use report::*;
pub use summary::*;
