//! Error types for WL feature generation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Unified error type for collection, pruning and embedding.
#[derive(Error, Debug)]
pub enum WlError {
    /// Invalid engine or solver configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A MaxSAT clause or problem violates the weighted-CNF rules
    #[error("Invalid MaxSAT clause: {0}")]
    InvalidClause(String),

    #[error("Features have already been collected")]
    AlreadyCollected,

    #[error("Features have not been collected yet")]
    NotCollected,

    /// Creating, writing or deleting one of the solver's temporary files failed
    #[error("Temporary file error on '{}': {source}", path.display())]
    TempFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch MaxSAT solver '{}': {source}", executable.display())]
    SolverLaunch {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("MaxSAT solver timed out after {0:?}")]
    SolverTimeout(Duration),

    #[error("No solution found: 's OPTIMUM FOUND' not present in solver output")]
    NoOptimum,

    #[error("Malformed solver output: {0}")]
    MalformedSolution(String),

    #[error("MaxSAT problem has no assignment satisfying its hard clauses")]
    Unsatisfiable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WlError {
    pub fn config(message: impl Into<String>) -> Self {
        WlError::Config(message.into())
    }

    pub fn clause(message: impl Into<String>) -> Self {
        WlError::InvalidClause(message.into())
    }

    pub(crate) fn temp_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WlError::TempFile {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, WlError>;
