//! AQI risk banding.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Discrete risk category, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    Unhealthy,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Moderate,
        RiskLevel::UnhealthyForSensitiveGroups,
        RiskLevel::Unhealthy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            RiskLevel::Unhealthy => "Unhealthy",
        }
    }

    /// Map marker color.
    pub fn color(self) -> &'static str {
        match self {
            RiskLevel::Low => "green",
            RiskLevel::Moderate => "yellow",
            RiskLevel::UnhealthyForSensitiveGroups => "orange",
            RiskLevel::Unhealthy => "red",
        }
    }

    /// AQI category label used when interpreting a predicted AQI.
    pub fn category(self) -> &'static str {
        match self {
            RiskLevel::Low => "Good",
            other => other.as_str(),
        }
    }

    pub fn health_concern(self) -> &'static str {
        match self {
            RiskLevel::Low => "None",
            RiskLevel::Moderate => "Unusually sensitive people may experience symptoms",
            RiskLevel::UnhealthyForSensitiveGroups => concat!(
                "Children, elderly, and people with heart/lung disease ",
                "should limit outdoor activity"
            ),
            RiskLevel::Unhealthy => "Everyone should limit outdoor activity",
        }
    }

    pub fn is_high_risk(self) -> bool {
        self >= RiskLevel::UnhealthyForSensitiveGroups
    }
}

/// Lower bounds (inclusive) of the three upper bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskBands {
    pub moderate: f64,
    pub sensitive: f64,
    pub unhealthy: f64,
}

impl Default for RiskBands {
    fn default() -> Self {
        Self {
            moderate: 50.0,
            sensitive: 100.0,
            unhealthy: 150.0,
        }
    }
}

impl RiskBands {
    pub fn validate(&self) -> Result<(), EngineError> {
        let ordered = 0.0 <= self.moderate
            && self.moderate <= self.sensitive
            && self.sensitive <= self.unhealthy;
        if ordered && self.unhealthy.is_finite() {
            Ok(())
        } else {
            Err(EngineError::invalid(
                "risk_bands",
                "cut points must be finite, non-negative and non-decreasing",
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskClassifier {
    bands: RiskBands,
}

impl RiskClassifier {
    pub fn new(bands: RiskBands) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &RiskBands {
        &self.bands
    }

    pub fn classify(&self, aqi: f64) -> Result<RiskLevel, EngineError> {
        if aqi.is_nan() || aqi < 0.0 {
            return Err(EngineError::invalid("aqi", format!("{aqi} is not >= 0")));
        }
        let level = if aqi >= self.bands.unhealthy {
            RiskLevel::Unhealthy
        } else if aqi >= self.bands.sensitive {
            RiskLevel::UnhealthyForSensitiveGroups
        } else if aqi >= self.bands.moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        };
        Ok(level)
    }
}

/// Classify with the standard 50/100/150 bands.
pub fn classify(aqi: f64) -> Result<RiskLevel, EngineError> {
    RiskClassifier::default().classify(aqi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_fall_into_the_higher_band() -> Result<(), EngineError> {
        assert_eq!(classify(0.0)?, RiskLevel::Low);
        assert_eq!(classify(49.99)?, RiskLevel::Low);
        assert_eq!(classify(50.0)?, RiskLevel::Moderate);
        assert_eq!(classify(99.9)?, RiskLevel::Moderate);
        assert_eq!(classify(100.0)?, RiskLevel::UnhealthyForSensitiveGroups);
        assert_eq!(classify(150.0)?, RiskLevel::Unhealthy);
        Ok(())
    }

    #[test]
    fn values_above_scale_still_classify_unhealthy() -> Result<(), EngineError> {
        assert_eq!(classify(500.0)?, RiskLevel::Unhealthy);
        assert_eq!(classify(1200.0)?, RiskLevel::Unhealthy);
        Ok(())
    }

    #[test]
    fn negative_and_nan_aqi_are_rejected() {
        assert!(matches!(
            classify(-0.5),
            Err(EngineError::InvalidInput { field: "aqi", .. })
        ));
        assert!(matches!(
            classify(f64::NAN),
            Err(EngineError::InvalidInput { field: "aqi", .. })
        ));
    }

    #[test]
    fn classification_is_monotonic() -> Result<(), EngineError> {
        let mut previous = RiskLevel::Low;
        for step in 0..=400 {
            let level = classify(step as f64 * 0.5)?;
            assert!(level >= previous, "band decreased at aqi {}", step as f64 * 0.5);
            previous = level;
        }
        Ok(())
    }

    #[test]
    fn custom_bands_shift_cut_points() -> Result<(), EngineError> {
        let classifier = RiskClassifier::new(RiskBands {
            moderate: 40.0,
            sensitive: 80.0,
            unhealthy: 120.0,
        });

        assert_eq!(classifier.classify(45.0)?, RiskLevel::Moderate);
        assert_eq!(classifier.classify(120.0)?, RiskLevel::Unhealthy);
        Ok(())
    }

    #[test]
    fn unordered_bands_fail_validation() {
        let bands = RiskBands {
            moderate: 100.0,
            sensitive: 50.0,
            unhealthy: 150.0,
        };

        assert!(bands.validate().is_err());
    }

    #[test]
    fn risk_level_serializes_with_display_labels() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(RiskLevel::UnhealthyForSensitiveGroups)?;

        assert_eq!(value, serde_json::json!("Unhealthy for Sensitive Groups"));
        assert_eq!(RiskLevel::Low.category(), "Good");
        Ok(())
    }
}
