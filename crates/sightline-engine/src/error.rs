//! Error types for the detection engine.

use thiserror::Error;

use sightline_perception::PerceptionError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Faults reported by a detection loop.
///
/// Faults are local to one loop instance; they never affect sibling loops
/// sharing a model handle, and the loop remains usable afterwards.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The model load failed; the model stays unavailable for this scope.
    #[error("model unavailable: {0}")]
    LoadFailure(String),

    /// A detect call failed. The loop self-heals: a later valid trigger
    /// attempts detection again.
    #[error("detect call failed: {0}")]
    DetectFailure(#[source] PerceptionError),
}

impl EngineError {
    /// Create a load failure fault.
    pub fn load_failure(message: impl Into<String>) -> Self {
        Self::LoadFailure(message.into())
    }
}
