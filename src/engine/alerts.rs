//! Rule-based alert generation and ranking.

use crate::engine::risk::{RiskClassifier, RiskLevel};
use crate::error::EngineError;
use crate::records::{HealthRecord, StationReading};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use tracing::warn;

pub const DEFAULT_ALERT_LIMIT: usize = 50;
pub const DEFAULT_PERSONAL_ALERT_LIMIT: usize = 20;

pub const AIR_QUALITY: &str = "Air Quality";
pub const CARDIAC: &str = "Cardiac";
pub const FEVER: &str = "Fever";
pub const RESPIRATORY: &str = "Respiratory";
pub const ACTIVITY_MISMATCH: &str = "Activity Mismatch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(EngineError::invalid(
                "severity",
                format!("unknown severity `{other}` (expected high, medium or low)"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum AlertSource {
    Station(String),
    Subject(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub alert_id: String,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub source: AlertSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Rule for flagging an elevated heart rate with almost no movement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityMismatchRule {
    pub max_step_count: f64,
    pub min_heart_rate: f64,
}

impl Default for ActivityMismatchRule {
    fn default() -> Self {
        Self {
            max_step_count: 300.0,
            min_heart_rate: 100.0,
        }
    }
}

/// Personal alert thresholds. Comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub heart_rate_high: f64,
    pub heart_rate_low: f64,
    pub fever_celsius: f64,
    pub blood_oxygen_low: f64,
    pub activity_mismatch: Option<ActivityMismatchRule>,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            heart_rate_high: 120.0,
            heart_rate_low: 50.0,
            fever_celsius: 38.0,
            blood_oxygen_low: 92.0,
            activity_mismatch: None,
        }
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<(), EngineError> {
        let finite = [
            self.heart_rate_high,
            self.heart_rate_low,
            self.fever_celsius,
            self.blood_oxygen_low,
        ]
        .iter()
        .all(|value| value.is_finite());
        if !finite {
            return Err(EngineError::invalid("alerts", "thresholds must be finite"));
        }
        if self.heart_rate_low > self.heart_rate_high {
            return Err(EngineError::invalid(
                "alerts",
                "heart_rate_low must not exceed heart_rate_high",
            ));
        }
        if let Some(rule) = self.activity_mismatch
            && !(rule.max_step_count.is_finite() && rule.min_heart_rate.is_finite())
        {
            return Err(EngineError::invalid(
                "activity_mismatch",
                "rule thresholds must be finite",
            ));
        }
        Ok(())
    }
}

/// Post-generation selection. Sorting always happens before these apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlertGenerator {
    classifier: RiskClassifier,
    thresholds: AlertThresholds,
}

impl AlertGenerator {
    pub fn new(classifier: RiskClassifier, thresholds: AlertThresholds) -> Self {
        Self {
            classifier,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Invalid readings are skipped with a warning.
    pub fn generate_station_alerts(&self, readings: &[StationReading]) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for reading in readings {
            if let Err(err) = reading.validate() {
                warn!(
                    station_id = %reading.station_id,
                    error = %err,
                    "Skipping invalid station reading"
                );
                continue;
            }
            match self.classifier.classify(reading.aqi) {
                Ok(level) => alerts.extend(station_alert(reading, level)),
                Err(err) => {
                    warn!(
                        station_id = %reading.station_id,
                        error = %err,
                        "Skipping unclassifiable station reading"
                    );
                }
            }
        }
        alerts
    }

    pub fn generate_personal_alerts(
        &self,
        record: &HealthRecord,
    ) -> Result<Vec<Alert>, EngineError> {
        record.validate()?;
        let thresholds = &self.thresholds;
        let mut alerts = Vec::new();

        if record.heart_rate > thresholds.heart_rate_high
            || record.heart_rate < thresholds.heart_rate_low
        {
            let (message, recommendation) = if record.heart_rate > thresholds.heart_rate_high {
                (
                    format!("Your heart rate is elevated ({:.0} bpm).", record.heart_rate),
                    "Stop exertion, rest and seek medical attention if it stays elevated",
                )
            } else {
                (
                    format!("Your heart rate is unusually low ({:.0} bpm).", record.heart_rate),
                    "Seek medical attention if you feel dizzy or faint",
                )
            };
            alerts.push(personal_alert(
                record,
                "HR",
                Severity::High,
                CARDIAC,
                message,
                recommendation,
                record.heart_rate,
            ));
        }

        if record.body_temperature > thresholds.fever_celsius {
            alerts.push(personal_alert(
                record,
                "TEMP",
                Severity::Medium,
                FEVER,
                format!(
                    "Your body temperature is elevated ({:.1}°C).",
                    record.body_temperature
                ),
                "Stay hydrated and rest. Consult a doctor if it persists.",
                record.body_temperature,
            ));
        }

        if record.blood_oxygen < thresholds.blood_oxygen_low {
            alerts.push(personal_alert(
                record,
                "O2",
                Severity::High,
                RESPIRATORY,
                format!("Your blood oxygen level is low ({:.0}%).", record.blood_oxygen),
                "Seek medical attention",
                record.blood_oxygen,
            ));
        }

        if let Some(rule) = thresholds.activity_mismatch
            && record.step_count < rule.max_step_count
            && record.heart_rate > rule.min_heart_rate
        {
            alerts.push(personal_alert(
                record,
                "ACT",
                Severity::Low,
                ACTIVITY_MISMATCH,
                "High heart rate with low step count detected.".to_string(),
                "This might indicate stress. Consider relaxation techniques.",
                record.heart_rate,
            ));
        }

        Ok(alerts)
    }

    /// Alerts for every valid record; invalid records are skipped with a warning.
    pub fn generate_personal_alerts_for(&self, records: &[HealthRecord]) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for record in records {
            match self.generate_personal_alerts(record) {
                Ok(generated) => alerts.extend(generated),
                Err(err) => {
                    warn!(
                        subject_id = %record.subject_id,
                        error = %err,
                        "Skipping invalid health record"
                    );
                }
            }
        }
        alerts
    }
}

fn station_alert(reading: &StationReading, level: RiskLevel) -> Option<Alert> {
    let (severity, message, recommendation) = match level {
        RiskLevel::Unhealthy => (
            Severity::High,
            format!("Unhealthy air quality detected (AQI: {:.1})", reading.aqi),
            "Limit outdoor exposure; everyone should avoid prolonged outdoor exertion",
        ),
        RiskLevel::UnhealthyForSensitiveGroups => (
            Severity::Medium,
            format!(
                "Air quality unhealthy for sensitive groups (AQI: {:.1})",
                reading.aqi
            ),
            "Limit outdoor activities for sensitive groups",
        ),
        RiskLevel::Low | RiskLevel::Moderate => return None,
    };
    Some(Alert {
        alert_id: format!("AQ-{}-{}", reading.station_id, reading.timestamp.unix_timestamp()),
        severity,
        kind: AIR_QUALITY.to_string(),
        message,
        location: Some(format!("Station {}", reading.station_id)),
        recommendation: Some(recommendation.to_string()),
        timestamp: reading.timestamp,
        source: AlertSource::Station(reading.station_id.clone()),
        value: Some(reading.aqi),
    })
}

fn personal_alert(
    record: &HealthRecord,
    prefix: &str,
    severity: Severity,
    kind: &str,
    message: String,
    recommendation: &str,
    value: f64,
) -> Alert {
    let id_suffix = record.record_id.clone().unwrap_or_else(|| {
        format!(
            "{}-{}",
            record.subject_id,
            record.timestamp.unix_timestamp()
        )
    });
    Alert {
        alert_id: format!("{prefix}-{id_suffix}"),
        severity,
        kind: kind.to_string(),
        message,
        location: Some(format!("{:.4}, {:.4}", record.latitude, record.longitude)),
        recommendation: Some(recommendation.to_string()),
        timestamp: record.timestamp,
        source: AlertSource::Subject(record.subject_id.clone()),
        value: Some(value),
    }
}

/// Sort by severity (High first) then most recent first, then filter and truncate.
pub fn rank_alerts(mut alerts: Vec<Alert>, filter: AlertFilter) -> Vec<Alert> {
    alerts.sort_by_key(|alert| (Reverse(alert.severity), Reverse(alert.timestamp)));
    if let Some(severity) = filter.severity {
        alerts.retain(|alert| alert.severity == severity);
    }
    if let Some(limit) = filter.limit {
        alerts.truncate(limit);
    }
    alerts
}
