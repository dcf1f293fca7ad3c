use codepunk_errors::ErrorCode;
use thiserror::Error;

/// Errors the plan engine, safety gate, and generator can produce.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("File count {count} exceeds limit {max}")]
    TooManyFiles { count: u64, max: u64 },
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("model output invalid: {preview}")]
    ModelOutputInvalid { preview: String },
    #[error("plan {0} not found")]
    PlanNotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlanError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PlanError::TooManyFiles { .. } => ErrorCode::TooManyFiles,
            PlanError::ModelUnavailable(_) => ErrorCode::ModelUnavailable,
            PlanError::ModelOutputInvalid { .. } => ErrorCode::ModelOutputInvalid,
            PlanError::PlanNotFound(_) => ErrorCode::InputMissing,
            PlanError::Io(_) | PlanError::Json(_) | PlanError::Other(_) => ErrorCode::InputMissing,
        }
    }
}
