//! Linear regression model over named features.
//!
//! Formula: output = intercept + sum(weight[name] * feature[name])

use crate::predictor::features::{FeatureSchema, FeatureVector};
use crate::predictor::model::{
    Prediction, PredictionOutput, Predictor, PredictorError, ensure_schema,
};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Linear model parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearParams {
    pub intercept: f64,
    /// Feature name to coefficient; unlisted features weigh zero.
    pub weights: BTreeMap<String, f64>,
    pub min_output: Option<f64>,
    pub max_output: Option<f64>,
    /// Validation score reported as the prediction confidence.
    pub confidence: Option<f64>,
}

impl Default for LinearParams {
    fn default() -> Self {
        // PM2.5-dominated AQI approximation
        let weights = [("pm25", 1.6), ("pm10", 0.35), ("no2", 0.4), ("o3", 0.3), ("co", 8.0)]
            .into_iter()
            .map(|(name, weight)| (name.to_string(), weight))
            .collect();
        Self {
            intercept: 0.0,
            weights,
            min_output: Some(0.0),
            max_output: None,
            confidence: None,
        }
    }
}

#[derive(Debug)]
pub struct LinearModel {
    pub schema: FeatureSchema,
    pub params: LinearParams,
}

impl LinearModel {
    pub fn new(schema: FeatureSchema, params: LinearParams) -> Self {
        Self { schema, params }
    }

    pub fn with_defaults() -> Self {
        Self::new(FeatureSchema::AirQuality, LinearParams::default())
    }

    /// Weight names that the schema does not produce.
    pub fn unknown_weights(&self) -> Vec<&str> {
        let known = self.schema.feature_names();
        self.params
            .weights
            .keys()
            .map(String::as_str)
            .filter(|name| !known.iter().any(|known_name| known_name == name))
            .collect()
    }
}

impl Predictor for LinearModel {
    fn schema(&self) -> FeatureSchema {
        self.schema
    }

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictorError> {
        ensure_schema(self.schema, features)?;
        let values = features
            .named_values()
            .map_err(|err| PredictorError::Features(err.to_string()))?;

        let mut output = self.params.intercept;
        for (name, value) in values {
            if let Some(weight) = self.params.weights.get(name) {
                output += weight * value;
            }
        }

        // Apply bounds
        if let Some(min) = self.params.min_output {
            output = output.max(min);
        }
        if let Some(max) = self.params.max_output {
            output = output.min(max);
        }

        Ok(Prediction {
            output: PredictionOutput::Value(output),
            confidence: self.params.confidence,
            probabilities: BTreeMap::new(),
        })
    }

    fn name(&self) -> &str {
        "linear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::features::fixtures::{activity, air_quality};

    fn params(intercept: f64, weights: &[(&str, f64)]) -> LinearParams {
        LinearParams {
            intercept,
            weights: weights.iter().map(|(n, w)| (n.to_string(), *w)).collect(),
            min_output: None,
            max_output: None,
            confidence: Some(0.91),
        }
    }

    #[test]
    fn output_uses_intercept_and_weights() -> Result<(), PredictorError> {
        let model = LinearModel::new(
            FeatureSchema::AirQuality,
            params(5.0, &[("pm25", 2.0), ("no2", 1.0)]),
        );

        let prediction = model.predict(&FeatureVector::AirQuality(air_quality()))?;

        // 5 + 2 * 40 + 25
        assert_eq!(prediction.output, PredictionOutput::Value(110.0));
        assert_eq!(prediction.confidence, Some(0.91));
        Ok(())
    }

    #[test]
    fn output_respects_bounds() -> Result<(), PredictorError> {
        let mut bounded = params(-500.0, &[("pm25", 1.0)]);
        bounded.min_output = Some(0.0);
        let model = LinearModel::new(FeatureSchema::AirQuality, bounded);

        let prediction = model.predict(&FeatureVector::AirQuality(air_quality()))?;

        assert_eq!(prediction.output, PredictionOutput::Value(0.0));
        Ok(())
    }

    #[test]
    fn wrong_schema_is_rejected() {
        let model = LinearModel::with_defaults();

        let result = model.predict(&FeatureVector::Activity(activity(90.0, 400.0)));

        assert!(matches!(result, Err(PredictorError::SchemaMismatch { .. })));
    }

    #[test]
    fn unknown_weight_names_are_reported() {
        let model = LinearModel::new(
            FeatureSchema::AirQuality,
            params(0.0, &[("pm25", 1.0), ("heart_rate", 1.0)]),
        );

        assert_eq!(model.unknown_weights(), vec!["heart_rate"]);
    }
}
