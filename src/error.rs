use std::path::{Path, PathBuf};

/// Errors produced while fitting or applying a magnitude calibration.
#[derive(Debug, thiserror::Error)]
pub enum CalibError {
    #[error("{0}")]
    Input(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} needs at least {needed} points, got {got}")]
    InsufficientPoints {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("degenerate fit: {0}")]
    DegenerateFit(String),

    #[error("calibration is not monotonic: catalog magnitude decreases near instrumental magnitude {at:.4}")]
    NonMonotonic { at: f64 },

    #[error("cannot parse calibration parameters in '{}': {reason}", path.display())]
    ParamFile { path: PathBuf, reason: String },
}

impl CalibError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::DegenerateFit(message.into())
    }

    /// Process exit code for the `magcal` binary.
    ///
    /// Every calibration failure maps to `1`; clap reports usage errors with `2`
    /// on its own before we ever get here.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

pub type Result<T, E = CalibError> = std::result::Result<T, E>;
