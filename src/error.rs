use std::time::Duration;

use thiserror::Error;

/// Conditions that abort an analysis. Missing segmentation and unmatched
/// labels are normal outcomes and never surface here.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    FatalInput(String),
    #[error("semantic recognition failed: {0}")]
    Recognition(String),
    #[error("semantic recognition timed out after {0:?}")]
    RecognitionTimeout(Duration),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
