use crate::engine::facade::Dashboard;
use crate::predictor::Predictor;
use crate::predictor::features::FeatureSchema;
use std::sync::Arc;

#[derive(Debug)]
pub struct AppState {
    service_name: String,
    dashboard: Dashboard,
}

impl AppState {
    pub fn new(service_name: impl Into<String>, dashboard: Dashboard) -> Self {
        Self {
            service_name: service_name.into(),
            dashboard,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn set_predictor(&mut self, predictor: Arc<dyn Predictor>) {
        tracing::info!(
            schema = %predictor.schema(),
            model = predictor.name(),
            "Predictor installed"
        );
        self.dashboard.set_predictor(predictor);
    }

    pub fn has_predictor(&self, schema: FeatureSchema) -> bool {
        self.dashboard.has_predictor(schema)
    }
}
