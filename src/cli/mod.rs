//! Command-line parsing for the `magcal` magnitude calibration tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting and file-rewriting code; `app` turns these structs into configs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::FitMode;
use crate::io::DEFAULT_PARAM_FILE;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "magcal", version, about = "Photometric magnitude scale calibration")]
pub struct Cli {
    /// Log level or flexi_logger spec (e.g. `debug`, `info,mag_calib::fit=trace`).
    #[arg(long, global = true, env = "MAGCAL_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a calibration to control points and write the parameter file.
    Fit(FitArgs),
    /// Print a stored calibration in the same format `fit` prints.
    Show(ShowArgs),
    /// Apply a calibration to every lightcurve file in a directory.
    Apply(ApplyArgs),
}

/// Options for fitting.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Calibration family (or `auto` to choose by number of control points).
    #[arg(value_enum)]
    pub mode: FitMode,

    /// Control-point file: `instrumental catalog [error]` per line.
    #[arg(default_value = "calib.txt")]
    pub control_file: PathBuf,

    /// Where to write the fitted parameters.
    #[arg(long, env = "MAGCAL_PARAMS", default_value = DEFAULT_PARAM_FILE)]
    pub params: PathBuf,

    /// Also write a JSON fit report.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Seed for the inverse-photocurve restart draws.
    #[arg(long, env = "MAGCAL_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Maximum random restarts for a non-converging inverse photocurve.
    #[arg(long, default_value_t = 1000)]
    pub max_restarts: usize,

    /// Levenberg-Marquardt iteration limit.
    #[arg(long, default_value_t = 200)]
    pub lm_max_iter: usize,

    /// Levenberg-Marquardt step tolerance (absolute and relative).
    #[arg(long, default_value_t = 1e-5)]
    pub lm_tol: f64,

    /// Minimum control points before `auto` tries curved models.
    #[arg(long, default_value_t = crate::domain::MIN_STARS_FOR_POLY)]
    pub min_stars_poly: usize,

    /// Keep a calibration that decreases over the fitted range (warn only).
    #[arg(long)]
    pub allow_non_monotonic: bool,
}

/// Options for printing a stored calibration.
#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Parameter file written by `magcal fit`.
    #[arg(env = "MAGCAL_PARAMS", default_value = DEFAULT_PARAM_FILE)]
    pub params: PathBuf,
}

/// Options for bulk application.
#[derive(Debug, Args, Clone)]
pub struct ApplyArgs {
    /// Directory holding the `out*.dat` lightcurve files.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Parameter file written by `magcal fit` (used unless coefficients are given).
    #[arg(long, env = "MAGCAL_PARAMS")]
    pub params: Option<PathBuf>,

    /// Polynomial coefficients `A B C` of `A·m² + B·m + C`.
    #[arg(
        long,
        num_args = 3,
        value_names = ["A", "B", "C"],
        allow_negative_numbers = true,
        conflicts_with = "photocurve"
    )]
    pub poly: Option<Vec<f64>>,

    /// Photocurve tag (4 or 5) and coefficients `A0 A1 A2 A3`.
    #[arg(
        long,
        num_args = 5,
        value_names = ["TAG", "A0", "A1", "A2", "A3"],
        allow_negative_numbers = true
    )]
    pub photocurve: Option<Vec<f64>>,

    /// Summary log whose limiting magnitude line is recalibrated
    /// (default: `vast_summary.log` in the lightcurve directory).
    #[arg(long)]
    pub summary_log: Option<PathBuf>,

    /// Drop records whose propagated error exceeds this (mag).
    #[arg(long, default_value_t = 1.086 / 3.0)]
    pub max_mag_error: f64,
}
