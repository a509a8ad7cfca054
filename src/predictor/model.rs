//! Prediction capability trait.
//!
//! Every model consumes a `FeatureVector` and produces either a scalar value
//! (AQI regression) or a label (activity classification). Models are
//! selected by the `model` field of their descriptor file and loaded at
//! startup.

use crate::predictor::features::{FeatureSchema, FeatureVector};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionOutput {
    Value(f64),
    Label(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub output: PredictionOutput,
    pub confidence: Option<f64>,
    /// Per-class probabilities, empty for regression models.
    pub probabilities: BTreeMap<String, f64>,
}

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("model expects {expected} features, got {actual}")]
    SchemaMismatch {
        expected: FeatureSchema,
        actual: FeatureSchema,
    },
    #[error("feature extraction failed: {0}")]
    Features(String),
    #[error("remote model call failed: {0}")]
    Remote(String),
    #[error("model returned an invalid output: {0}")]
    InvalidOutput(String),
}

pub trait Predictor: Send + Sync + std::fmt::Debug {
    /// Schema this model was trained on.
    fn schema(&self) -> FeatureSchema;

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictorError>;

    /// Short identifier reported alongside predictions.
    fn name(&self) -> &str;
}

pub(crate) fn ensure_schema(
    expected: FeatureSchema,
    features: &FeatureVector,
) -> Result<(), PredictorError> {
    let actual = features.schema();
    if actual == expected {
        Ok(())
    } else {
        Err(PredictorError::SchemaMismatch { expected, actual })
    }
}
