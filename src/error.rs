use thiserror::Error;

/// Errors that stop a run before or outside the solve itself.
///
/// Infeasible, timed-out and invalid models are solve outcomes, reported
/// through [`SolveStatus`](crate::solver::SolveStatus), not errors.
#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("data error: {0}")]
    Data(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TimetableError>;
