//! Crate-wide error type

use thiserror::Error;

use crate::config::ConfigError;
use crate::forcefield::ForceFieldError;
use crate::grid::GridError;
use crate::io::IoError;
use crate::molecule::MoleculeError;
use crate::optimization::OptimizationError;

/// Any failure of a docking run
#[derive(Error, Debug)]
pub enum Error {
    #[error("Usage error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Molecule(#[from] MoleculeError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("Scoring function error: {0}")]
    ForceField(#[from] ForceFieldError),

    #[error(transparent)]
    Optimization(#[from] OptimizationError),

    /// The search finished without a single pose inside the box
    #[error("No poses were found for {0}")]
    NoPoses(String),
}

impl Error {
    /// True for failures to open, read or write a file
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            Error::Io(IoError::Io(_) | IoError::Open { .. })
                | Error::Grid(GridError::Io(IoError::Io(_) | IoError::Open { .. }))
        )
    }
}

/// Result type for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;
