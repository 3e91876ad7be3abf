//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging
//! - runs the fit / show / apply workflow
//! - prints machine-readable results to stdout

use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};

use crate::cli::{ApplyArgs, Command, FitArgs, ShowArgs};
use crate::domain::{ApplyConfig, CalibrationModel, FitConfig, LmSettings, PhotocurveParams};
use crate::error::{CalibError, Result};
use crate::io::{format_for_cli, read_param_file, DEFAULT_PARAM_FILE};

pub mod pipeline;

/// Entry point for the `magcal` binary.
pub fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    let _logger = init_logging(&cli.log_level)?;

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Show(args) => handle_show(args),
        Command::Apply(args) => handle_apply(args),
    }
}

fn init_logging(spec: &str) -> Result<LoggerHandle> {
    Logger::try_with_str(spec)
        .and_then(|logger| logger.start())
        .map_err(|e| CalibError::input(format!("Logger initialization failed: {e}")))
}

fn handle_fit(args: FitArgs) -> Result<()> {
    let request = pipeline::FitRequest {
        mode: args.mode,
        control_file: args.control_file.clone(),
        params_file: args.params.clone(),
        report_file: args.report.clone(),
        config: fit_config_from_args(&args),
    };
    let selection = pipeline::run_fit(&request)?;
    println!("{}", format_for_cli(&selection.model));
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<()> {
    let model = read_param_file(&args.params)?;
    println!("{}", format_for_cli(&model));
    Ok(())
}

fn handle_apply(args: ApplyArgs) -> Result<()> {
    let model = model_from_apply_args(&args)?;
    let config = apply_config_from_args(&args)?;
    let report = pipeline::run_apply(&model, &args.dir, &config, args.summary_log.as_deref())?;

    println!(
        "{} files processed, {} aborted, {} records written, {} dropped",
        report.files_processed,
        report.aborted_files.len(),
        report.records_written,
        report.records_dropped
    );
    // Aborted files are a per-file outcome, not a batch failure.
    for path in &report.aborted_files {
        println!("aborted: {}", path.display());
    }
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        lm: LmSettings {
            max_iterations: args.lm_max_iter,
            xtol_rel: args.lm_tol,
            xtol_abs: args.lm_tol,
        },
        max_restarts: args.max_restarts,
        seed: args.seed,
        min_stars_for_poly: args.min_stars_poly,
        require_monotonic: !args.allow_non_monotonic,
        ..FitConfig::default()
    }
}

pub fn apply_config_from_args(args: &ApplyArgs) -> Result<ApplyConfig> {
    if !(args.max_mag_error.is_finite() && args.max_mag_error > 0.0) {
        return Err(CalibError::input(format!(
            "--max-mag-error must be positive, got {}",
            args.max_mag_error
        )));
    }
    Ok(ApplyConfig {
        max_mag_error: args.max_mag_error,
        ..ApplyConfig::default()
    })
}

/// Resolve the calibration for `apply`: explicit coefficients first, then the
/// parameter file.
pub fn model_from_apply_args(args: &ApplyArgs) -> Result<CalibrationModel> {
    if let Some(poly) = &args.poly {
        let [a, b, c] = fixed::<3>(poly, "--poly")?;
        return Ok(if a == 0.0 {
            CalibrationModel::Linear {
                slope: b,
                intercept: c,
            }
        } else {
            CalibrationModel::Parabola { a, b, c }
        });
    }

    if let Some(values) = &args.photocurve {
        let [tag, a0, a1, a2, a3] = fixed::<5>(values, "--photocurve")?;
        let params = PhotocurveParams { a0, a1, a2, a3 };
        return match tag {
            t if t == 4.0 => Ok(CalibrationModel::Photocurve(params)),
            t if t == 5.0 => Ok(CalibrationModel::InversePhotocurve(params)),
            t => Err(CalibError::input(format!("--photocurve tag must be 4 or 5, got {t}"))),
        };
    }

    let path = args.params.clone().unwrap_or_else(|| DEFAULT_PARAM_FILE.into());
    read_param_file(&path)
}

fn fixed<const N: usize>(values: &[f64], flag: &str) -> Result<[f64; N]> {
    let arr: [f64; N] = values
        .try_into()
        .map_err(|_| CalibError::input(format!("{flag} takes {N} numbers, got {}", values.len())))?;
    if arr.iter().any(|v| !v.is_finite()) {
        return Err(CalibError::input(format!("{flag} coefficients must be finite")));
    }
    Ok(arr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::io::from_record;

    fn apply_args(argv: &[&str]) -> ApplyArgs {
        let mut full = vec!["magcal", "apply"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Apply(args) => args,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fit_config_maps_flags() {
        let cli = Cli::try_parse_from([
            "magcal",
            "fit",
            "auto",
            "--lm-tol",
            "1e-7",
            "--max-restarts",
            "10",
            "--allow-non-monotonic",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert_eq!(config.lm.xtol_abs, 1e-7);
        assert_eq!(config.lm.xtol_rel, 1e-7);
        assert_eq!(config.max_restarts, 10);
        assert!(!config.require_monotonic);
        assert_eq!(config.min_stars_for_line, crate::domain::MIN_STARS_FOR_LINE);
    }

    #[test]
    fn direct_coefficients_build_models() {
        let line = model_from_apply_args(&apply_args(&["--poly", "0", "1", "2.5"])).unwrap();
        assert_eq!(line, CalibrationModel::Linear { slope: 1.0, intercept: 2.5 });

        let parabola = model_from_apply_args(&apply_args(&["--poly", "0.01", "0.9", "2"])).unwrap();
        assert!(matches!(parabola, CalibrationModel::Parabola { .. }));

        let pc = model_from_apply_args(&apply_args(&["--photocurve", "5", "0.3", "1", "9", "10"])).unwrap();
        assert!(matches!(pc, CalibrationModel::InversePhotocurve(_)));

        assert!(model_from_apply_args(&apply_args(&["--photocurve", "2", "0.3", "1", "9", "10"])).is_err());
        assert!(model_from_apply_args(&apply_args(&["--poly", "0", "inf", "1"])).is_err());
    }

    #[test]
    fn max_mag_error_must_be_positive() {
        assert!(apply_config_from_args(&apply_args(&["--max-mag-error", "0"])).is_err());
        let config = apply_config_from_args(&apply_args(&["--max-mag-error", "0.5"])).unwrap();
        assert_eq!(config.max_mag_error, 0.5);
    }

    #[test]
    fn record_tags_match_direct_coefficients() {
        let from_file = from_record([4.0, 10.0, 9.0, 1.0, 0.3]).unwrap();
        let direct = model_from_apply_args(&apply_args(&["--photocurve", "4", "0.3", "1", "9", "10"])).unwrap();
        assert_eq!(from_file, direct);
    }
}
