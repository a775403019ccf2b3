//! Error type shared by the whole solver.

use std::fmt::{self, Display};

/// Everything that can stop a run before or during the search.
#[derive(Debug)]
pub enum SolverError {
    /// The instance file could not be read.
    Io(std::io::Error),
    /// The instance or config file is not valid JSON for the expected schema.
    Parse(serde_json::Error),
    /// A CSV artifact could not be written.
    Csv(csv::Error),
    /// The instance parsed but is structurally unusable.
    InvalidInstance(String),
    /// Rejected or unsupported parameter combination.
    Config(String),
    /// A repaired genotype lost or duplicated patients. Always a bug.
    Consistency {
        expected: usize,
        found: usize,
        missing: Vec<usize>,
        duplicated: Vec<usize>,
    },
}

impl Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Csv(e) => write!(f, "CSV error: {e}"),
            Self::InvalidInstance(msg) => write!(f, "Invalid instance: {msg}"),
            Self::Config(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::Consistency {
                expected,
                found,
                missing,
                duplicated,
            } => write!(
                f,
                "Repaired genotype holds {found} visits instead of {expected} (missing: {missing:?}, duplicated: {duplicated:?})"
            ),
        }
    }
}

impl std::error::Error for SolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SolverError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for SolverError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl From<csv::Error> for SolverError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;
