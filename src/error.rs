//! Error types of *rustgalerkin*
use ndarray_linalg::error::LinalgError;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SpectralError>;

/// A mode whose linear system could not be solved.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeFailure {
    /// Position of the mode in the coefficient array (separable axes only)
    pub index: Vec<usize>,
    /// Wavenumbers of the mode
    pub wavenumber: Vec<i64>,
    /// Estimate of the reciprocal condition number, `0` for exactly singular
    pub rcond: f64,
    /// Reason reported by the factorization
    pub reason: String,
}

impl fmt::Display for ModeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode {:?} (k = {:?}, rcond = {:.3e}): {}",
            self.index, self.wavenumber, self.rcond, self.reason
        )
    }
}

/// Collection of all failed modes of a solve
#[derive(Debug, Clone, PartialEq)]
pub struct ModeFailures(pub Vec<ModeFailure>);

impl fmt::Display for ModeFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", list.join("; "))
    }
}

/// Errors of space construction, assembly and solves
#[derive(Error, Debug)]
pub enum SpectralError {
    /// Invalid basis or space parameters
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Array shape does not match the space it belongs to
    #[error("dimension mismatch: expected shape {expected:?}, got {found:?}")]
    DimensionMismatch {
        /// Shape required by the space
        expected: Vec<usize>,
        /// Shape that was supplied
        found: Vec<usize>,
    },

    /// Trial and test spaces of a form cannot be combined
    #[error("incompatible form: {0}")]
    IncompatibleForm(String),

    /// Coordinate map is degenerate on the quadrature mesh
    #[error("unsupported coordinates: {0}")]
    UnsupportedCoordinate(String),

    /// One or more modes have a singular system
    #[error("singular system in {} mode(s): {failures}", .failures.0.len())]
    SingularSystem {
        /// Every failing mode, all others were solved
        failures: ModeFailures,
    },

    /// Eigenvalue solver did not converge
    #[error("eigen-solve failed: {0}")]
    Convergence(String),

    /// Space was released by `destroy`
    #[error("space has been released")]
    SpaceReleased,

    /// Shape error from ndarray
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    /// Lapack error from ndarray-linalg
    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

impl SpectralError {
    /// Shortcut for shape errors
    pub fn mismatch(expected: &[usize], found: &[usize]) -> Self {
        SpectralError::DimensionMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }

    /// Failed modes, if any
    pub fn failures(&self) -> Option<&[ModeFailure]> {
        match self {
            SpectralError::SingularSystem { failures } => Some(&failures.0),
            _ => None,
        }
    }
}
