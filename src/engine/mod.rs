//! Risk classification, trend analysis, alert generation and aggregation.
//!
//! Everything in here is a pure computation over caller-supplied snapshots.

use crate::error::EngineError;
use serde::Deserialize;

pub mod alerts;
pub mod facade;
pub mod risk;
pub mod stats;
pub mod trend;

use alerts::{AlertGenerator, AlertThresholds};
use risk::{RiskBands, RiskClassifier};
use trend::{DEFAULT_RELATIVE_TOLERANCE, TrendAnalyzer};

/// Every tunable threshold used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThresholdTable {
    pub risk_bands: RiskBands,
    pub alerts: AlertThresholds,
    pub trend_tolerance: f64,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            risk_bands: RiskBands::default(),
            alerts: AlertThresholds::default(),
            trend_tolerance: DEFAULT_RELATIVE_TOLERANCE,
        }
    }
}

impl ThresholdTable {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.risk_bands.validate()?;
        self.alerts.validate()?;
        if !self.trend_tolerance.is_finite() || self.trend_tolerance < 0.0 {
            return Err(EngineError::invalid(
                "trend_tolerance",
                "must be a finite, non-negative fraction",
            ));
        }
        Ok(())
    }

    pub fn classifier(&self) -> RiskClassifier {
        RiskClassifier::new(self.risk_bands)
    }

    pub fn alert_generator(&self) -> AlertGenerator {
        AlertGenerator::new(self.classifier(), self.alerts)
    }

    pub fn trend_analyzer(&self) -> TrendAnalyzer {
        TrendAnalyzer::new(self.trend_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_table_keeps_defaults() -> Result<(), toml::de::Error> {
        let table: ThresholdTable = toml::from_str(
            r#"
trend_tolerance = 0.1

[alerts]
fever_celsius = 37.5
"#,
        )?;

        assert_eq!(table.trend_tolerance, 0.1);
        assert_eq!(table.alerts.fever_celsius, 37.5);
        assert_eq!(table.alerts.heart_rate_high, 120.0);
        assert_eq!(table.risk_bands, RiskBands::default());
        Ok(())
    }

    #[test]
    fn negative_tolerance_is_invalid() {
        let table = ThresholdTable {
            trend_tolerance: -0.1,
            ..ThresholdTable::default()
        };

        assert!(matches!(
            table.validate(),
            Err(EngineError::InvalidInput {
                field: "trend_tolerance",
                ..
            })
        ));
    }

    #[test]
    fn inverted_heart_rate_alert_bounds_fail_table_validation() {
        let table = ThresholdTable {
            alerts: AlertThresholds {
                heart_rate_low: 130.0,
                ..AlertThresholds::default()
            },
            ..ThresholdTable::default()
        };

        assert!(matches!(
            table.validate(),
            Err(EngineError::InvalidInput { field: "alerts", .. })
        ));
    }
}
