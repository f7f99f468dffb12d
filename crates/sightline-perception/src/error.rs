//! Error types for perception operations.

use thiserror::Error;

/// Result type for perception operations.
pub type PerceptionResult<T> = Result<T, PerceptionError>;

/// Errors that can occur while loading or running a perception model.
#[derive(Debug, Clone, Error)]
pub enum PerceptionError {
    #[error("model load failed: {0}")]
    LoadFailed(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("detection failed: {0}")]
    DetectionFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PerceptionError {
    /// Create a load failure error.
    pub fn load_failed(message: impl Into<String>) -> Self {
        Self::LoadFailed(message.into())
    }

    /// Create a model unavailable error.
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable(message.into())
    }

    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
