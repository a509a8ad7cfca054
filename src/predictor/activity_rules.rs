//! Rule-based activity classifier.
//!
//! Evaluates the heart-rate/step-count domain rules in priority order
//! (running, cycling, walking, resting). The first matching rule is the
//! predicted label; probability mass is split evenly across every matching
//! rule.

use crate::predictor::features::{ActivityFeatures, FeatureSchema, FeatureVector};
use crate::predictor::model::{
    Prediction, PredictionOutput, Predictor, PredictorError, ensure_schema,
};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivityRulesParams {
    pub running_min_heart_rate: f64,
    pub running_min_steps: f64,
    pub cycling_min_heart_rate: f64,
    pub cycling_min_steps: f64,
    pub walking_heart_rate: (f64, f64),
    pub walking_steps: (f64, f64),
    pub resting_max_heart_rate: f64,
    pub resting_max_steps: f64,
    pub fallback_label: String,
    pub fallback_confidence: f64,
}

impl Default for ActivityRulesParams {
    fn default() -> Self {
        Self {
            running_min_heart_rate: 130.0,
            running_min_steps: 600.0,
            cycling_min_heart_rate: 120.0,
            cycling_min_steps: 650.0,
            walking_heart_rate: (80.0, 120.0),
            walking_steps: (400.0, 800.0),
            resting_max_heart_rate: 100.0,
            resting_max_steps: 500.0,
            fallback_label: "Unknown".to_string(),
            fallback_confidence: 0.25,
        }
    }
}

#[derive(Debug, Default)]
pub struct ActivityRulesModel {
    pub params: ActivityRulesParams,
}

impl ActivityRulesModel {
    pub fn new(params: ActivityRulesParams) -> Self {
        Self { params }
    }

    fn matching_labels(&self, features: &ActivityFeatures) -> Vec<&'static str> {
        let p = &self.params;
        let hr = features.heart_rate;
        let steps = features.step_count;
        let within = |value: f64, (lo, hi): (f64, f64)| lo <= value && value <= hi;

        let rules = [
            ("Running", hr > p.running_min_heart_rate && steps > p.running_min_steps),
            ("Cycling", hr > p.cycling_min_heart_rate && steps > p.cycling_min_steps),
            ("Walking", within(hr, p.walking_heart_rate) && within(steps, p.walking_steps)),
            ("Resting", hr < p.resting_max_heart_rate && steps < p.resting_max_steps),
        ];
        rules
            .into_iter()
            .filter(|(_, matched)| *matched)
            .map(|(label, _)| label)
            .collect()
    }
}

impl Predictor for ActivityRulesModel {
    fn schema(&self) -> FeatureSchema {
        FeatureSchema::Activity
    }

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictorError> {
        ensure_schema(FeatureSchema::Activity, features)?;
        let FeatureVector::Activity(activity) = features else {
            return Err(PredictorError::Features("expected activity features".to_string()));
        };

        let matched = self.matching_labels(activity);
        let Some(first) = matched.first() else {
            let label = self.params.fallback_label.clone();
            let probabilities = BTreeMap::from([(label.clone(), self.params.fallback_confidence)]);
            return Ok(Prediction {
                output: PredictionOutput::Label(label),
                confidence: Some(self.params.fallback_confidence),
                probabilities,
            });
        };

        let share = 1.0 / matched.len() as f64;
        Ok(Prediction {
            output: PredictionOutput::Label(first.to_string()),
            confidence: Some(share),
            probabilities: matched.iter().map(|label| (label.to_string(), share)).collect(),
        })
    }

    fn name(&self) -> &str {
        "activity_rules"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::features::fixtures::{activity, air_quality};

    fn predict(heart_rate: f64, steps: f64) -> Result<Prediction, PredictorError> {
        ActivityRulesModel::default().predict(&FeatureVector::Activity(activity(heart_rate, steps)))
    }

    #[test]
    fn running_takes_priority_over_cycling() -> Result<(), PredictorError> {
        let prediction = predict(150.0, 900.0)?;

        assert_eq!(prediction.output, PredictionOutput::Label("Running".to_string()));
        assert_eq!(prediction.confidence, Some(0.5));
        assert_eq!(prediction.probabilities.len(), 2);
        Ok(())
    }

    #[test]
    fn walking_and_resting_split_the_overlap() -> Result<(), PredictorError> {
        let prediction = predict(85.0, 450.0)?;

        assert_eq!(prediction.output, PredictionOutput::Label("Walking".to_string()));
        assert_eq!(prediction.probabilities.get("Resting"), Some(&0.5));
        Ok(())
    }

    #[test]
    fn resting_alone_is_fully_confident() -> Result<(), PredictorError> {
        let prediction = predict(62.0, 40.0)?;

        assert_eq!(prediction.output, PredictionOutput::Label("Resting".to_string()));
        assert_eq!(prediction.confidence, Some(1.0));
        Ok(())
    }

    #[test]
    fn no_rule_falls_back() -> Result<(), PredictorError> {
        let prediction = predict(125.0, 100.0)?;

        assert_eq!(prediction.output, PredictionOutput::Label("Unknown".to_string()));
        assert_eq!(prediction.confidence, Some(0.25));
        Ok(())
    }

    #[test]
    fn air_quality_features_are_rejected() {
        let result =
            ActivityRulesModel::default().predict(&FeatureVector::AirQuality(air_quality()));

        assert!(matches!(result, Err(PredictorError::SchemaMismatch { .. })));
    }
}
