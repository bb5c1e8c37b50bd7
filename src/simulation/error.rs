use thiserror::Error;

/// Errors surfaced to the caller of the simulation engine.
///
/// Unknown effect kinds and tutor fizzles are not errors, and a cancelled
/// batch is reported through `SimulationResult::cancelled`.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("trial {trial} attempted to draw from an empty library")]
    EmptyLibraryDraw { trial: u64 },
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl SimulationError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        SimulationError::MalformedRequest(reason.into())
    }
}
