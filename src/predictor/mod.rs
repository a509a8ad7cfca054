use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub mod activity_rules;
pub mod features;
pub mod linear;
pub mod model;
pub mod remote;

use activity_rules::{ActivityRulesModel, ActivityRulesParams};
use features::FeatureSchema;
use linear::{LinearModel, LinearParams};
pub use model::{Prediction, PredictionOutput, Predictor, PredictorError};
use remote::RemoteModel;

pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 2000;

/// Model descriptor file, e.g. `config/models/air_quality.json`.
#[derive(Debug, Deserialize)]
pub struct ModelFile {
    pub model: String,
    pub schema: FeatureSchema,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RemoteParams {
    endpoint: String,
    model_id: String,
    timeout_ms: Option<u64>,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum ModelConfigError {
    #[error("failed to read model file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse model file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid model configuration: {0}")]
    Invalid(String),
}

// Model Factory
pub fn create_predictor(file: &ModelFile) -> Result<Box<dyn Predictor>, ModelConfigError> {
    match file.model.as_str() {
        "linear" => {
            let params: LinearParams = serde_json::from_value(file.params.clone())?;
            let model = LinearModel::new(file.schema, params);
            let unknown = model.unknown_weights();
            if !unknown.is_empty() {
                return Err(ModelConfigError::Invalid(format!(
                    "weights for unknown {} features: {}",
                    file.schema,
                    unknown.join(", ")
                )));
            }
            Ok(Box::new(model))
        }
        "activity_rules" => {
            if file.schema != FeatureSchema::Activity {
                return Err(ModelConfigError::Invalid(
                    "activity_rules requires the activity schema".to_string(),
                ));
            }
            let params: ActivityRulesParams = if file.params.is_null() {
                ActivityRulesParams::default()
            } else {
                serde_json::from_value(file.params.clone())?
            };
            Ok(Box::new(ActivityRulesModel::new(params)))
        }
        "remote" => {
            let params: RemoteParams = serde_json::from_value(file.params.clone())?;
            let timeout =
                Duration::from_millis(params.timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS));
            Ok(Box::new(RemoteModel::new(
                params.endpoint,
                timeout,
                params.model_id,
                file.schema,
                params.params,
            )))
        }
        other => Err(ModelConfigError::Invalid(format!("unknown model: {other}"))),
    }
}

pub fn load_predictor_from_path(
    path: impl AsRef<Path>,
) -> Result<Box<dyn Predictor>, ModelConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let file: ModelFile = serde_json::from_str(&contents)?;
    create_predictor(&file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn model_file(value: serde_json::Value) -> Result<ModelFile, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn creates_linear_model() -> Result<(), Box<dyn std::error::Error>> {
        let file = model_file(json!({
            "model": "linear",
            "schema": "air_quality",
            "params": {"intercept": 2.0, "weights": {"pm25": 1.5}}
        }))?;

        let predictor = create_predictor(&file)?;

        assert_eq!(predictor.schema(), FeatureSchema::AirQuality);
        assert_eq!(predictor.name(), "linear");
        Ok(())
    }

    #[test]
    fn linear_model_rejects_unknown_feature_weights() -> Result<(), Box<dyn std::error::Error>> {
        let file = model_file(json!({
            "model": "linear",
            "schema": "air_quality",
            "params": {"intercept": 0.0, "weights": {"heart_rate": 1.0}}
        }))?;

        assert!(matches!(create_predictor(&file), Err(ModelConfigError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn activity_rules_default_params_when_omitted() -> Result<(), Box<dyn std::error::Error>> {
        let file = model_file(json!({"model": "activity_rules", "schema": "activity"}))?;

        let predictor = create_predictor(&file)?;

        assert_eq!(predictor.schema(), FeatureSchema::Activity);
        Ok(())
    }

    #[test]
    fn activity_rules_reject_air_quality_schema() -> Result<(), Box<dyn std::error::Error>> {
        let file = model_file(json!({"model": "activity_rules", "schema": "air_quality"}))?;

        assert!(matches!(create_predictor(&file), Err(ModelConfigError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn creates_remote_model() -> Result<(), Box<dyn std::error::Error>> {
        let file = model_file(json!({
            "model": "remote",
            "schema": "activity",
            "params": {"endpoint": "http://127.0.0.1:9100/predict", "model_id": "activity-mlp"}
        }))?;

        let predictor = create_predictor(&file)?;

        assert_eq!(predictor.name(), "activity-mlp");
        Ok(())
    }

    #[test]
    fn unknown_model_is_invalid() -> Result<(), Box<dyn std::error::Error>> {
        let file = model_file(json!({"model": "xgboost", "schema": "air_quality"}))?;

        assert!(matches!(create_predictor(&file), Err(ModelConfigError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn loads_predictor_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("airhealth-model-{unique}.json"));
        fs::write(
            &path,
            r#"{"model": "linear", "schema": "air_quality",
                "params": {"intercept": 0.0, "weights": {}}}"#,
        )?;

        let result = load_predictor_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(result.is_ok());
        Ok(())
    }

    #[test]
    fn missing_model_file_returns_read_error() {
        let path = std::env::temp_dir().join("airhealth-model-does-not-exist.json");

        assert!(matches!(load_predictor_from_path(&path), Err(ModelConfigError::Read(_))));
    }
}
