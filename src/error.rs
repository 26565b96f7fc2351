//! Error taxonomy shared by the whole solver.

use crate::distance::LocationKey;
use std::fmt::Display;

/// Errors raised while building, mutating, scoring or searching tours.
#[derive(Debug)]
pub enum SolverError {
    /// A distance or entity lookup used an id that was never registered.
    UnknownEntity(LocationKey),
    /// A move operator was handed stops that are not in the tour, or the
    /// resulting index bounds are degenerate.
    InvalidMove { reason: String },
    /// A scorer or the codec met a stop it cannot interpret.
    MalformedTour { reason: String },
    /// The requested initialization method has no implementation.
    NotImplemented(String),
    /// Search parameters are out of range.
    InvalidConfig(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
}

impl SolverError {
    pub fn invalid_move(reason: impl Into<String>) -> Self {
        SolverError::InvalidMove { reason: reason.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        SolverError::MalformedTour { reason: reason.into() }
    }

    /// Whether the error only disqualifies the candidate that produced it.
    ///
    /// The engine rejects such candidates and keeps searching; every other
    /// error aborts the run.
    pub fn is_candidate_local(&self) -> bool {
        matches!(
            self,
            SolverError::InvalidMove { .. } | SolverError::MalformedTour { .. }
        )
    }
}

impl Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverError::UnknownEntity(key) => write!(f, "Unknown entity {}", key),
            SolverError::InvalidMove { reason } => write!(f, "Invalid move: {}", reason),
            SolverError::MalformedTour { reason } => write!(f, "Malformed tour: {}", reason),
            SolverError::NotImplemented(what) => write!(f, "Not implemented: {}", what),
            SolverError::InvalidConfig(reason) => write!(f, "Invalid configuration: {}", reason),
            SolverError::Io(e) => write!(f, "I/O error: {}", e),
            SolverError::Json(e) => write!(f, "JSON error: {}", e),
            SolverError::Csv(e) => write!(f, "CSV error: {}", e),
        }
    }
}

impl std::error::Error for SolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SolverError::Io(e) => Some(e),
            SolverError::Json(e) => Some(e),
            SolverError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SolverError {
    fn from(e: std::io::Error) -> Self {
        SolverError::Io(e)
    }
}

impl From<serde_json::Error> for SolverError {
    fn from(e: serde_json::Error) -> Self {
        SolverError::Json(e)
    }
}

impl From<csv::Error> for SolverError {
    fn from(e: csv::Error) -> Self {
        SolverError::Csv(e)
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;
