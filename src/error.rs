use crate::predictor::PredictorError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid input for `{field}`: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl EngineError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::UpstreamUnavailable(err.to_string())
    }
}

impl From<PredictorError> for EngineError {
    fn from(err: PredictorError) -> Self {
        EngineError::UpstreamUnavailable(err.to_string())
    }
}
