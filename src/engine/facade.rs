//! Request-level composition of the engine components.

use crate::engine::ThresholdTable;
use crate::engine::alerts::{
    Alert, AlertFilter, DEFAULT_ALERT_LIMIT, DEFAULT_PERSONAL_ALERT_LIMIT, Severity, rank_alerts,
};
use crate::engine::risk::RiskLevel;
use crate::engine::stats::{AggregateStats, aggregate_health_stats, aggregate_station_stats};
use crate::engine::trend::{TrendSummary, window_start};
use crate::error::EngineError;
use crate::predictor::features::{FeatureSchema, FeatureVector};
use crate::predictor::{PredictionOutput, Predictor};
use crate::records::{HealthRecord, Pollutants, StationReading};
use crate::store::ReadingStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

pub const DEFAULT_TREND_DAYS: u32 = 7;
pub const ALL_SUBJECTS: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthMetric {
    HeartRate,
    StepCount,
    BodyTemperature,
    BloodOxygen,
}

impl HealthMetric {
    pub const ALL: [HealthMetric; 4] = [
        HealthMetric::HeartRate,
        HealthMetric::StepCount,
        HealthMetric::BodyTemperature,
        HealthMetric::BloodOxygen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HealthMetric::HeartRate => "heart_rate",
            HealthMetric::StepCount => "step_count",
            HealthMetric::BodyTemperature => "body_temperature",
            HealthMetric::BloodOxygen => "blood_oxygen",
        }
    }

    fn value(self, record: &HealthRecord) -> f64 {
        match self {
            HealthMetric::HeartRate => record.heart_rate,
            HealthMetric::StepCount => record.step_count,
            HealthMetric::BodyTemperature => record.body_temperature,
            HealthMetric::BloodOxygen => record.blood_oxygen,
        }
    }
}

impl fmt::Display for HealthMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `all` or a single metric name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricSelector {
    #[default]
    All,
    One(HealthMetric),
}

impl MetricSelector {
    fn metrics(self) -> Vec<HealthMetric> {
        match self {
            MetricSelector::All => HealthMetric::ALL.to_vec(),
            MetricSelector::One(metric) => vec![metric],
        }
    }
}

impl FromStr for MetricSelector {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(MetricSelector::All);
        }
        HealthMetric::ALL
            .into_iter()
            .find(|metric| metric.name().eq_ignore_ascii_case(value))
            .map(MetricSelector::One)
            .ok_or_else(|| EngineError::invalid("metric", format!("unknown metric `{value}`")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMapEntry {
    pub station_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub aqi: f64,
    pub risk_level: RiskLevel,
    pub color: &'static str,
    pub pollutants: Pollutants,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMap {
    pub stations: Vec<RiskMapEntry>,
    pub total_stations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertList {
    pub alerts: Vec<Alert>,
    /// Alerts generated before severity filtering and truncation.
    pub total_generated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalAlerts {
    pub subject_id: String,
    pub alerts: Vec<Alert>,
    pub total_generated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalTrends {
    pub subject_id: String,
    pub period_days: u32,
    pub trends: BTreeMap<String, TrendSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_distribution: Option<BTreeMap<String, usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirQualityPrediction {
    pub predicted_aqi: f64,
    pub risk_level: RiskLevel,
    pub category: &'static str,
    pub health_concern: &'static str,
    pub confidence: Option<f64>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityPrediction {
    pub predicted_activity: String,
    pub confidence: Option<f64>,
    pub probabilities: BTreeMap<String, f64>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionResult {
    AirQuality(AirQualityPrediction),
    Activity(ActivityPrediction),
}

/// Engine entry point for one request. Cloning only clones handles.
#[derive(Debug, Clone)]
pub struct Dashboard {
    store: Arc<dyn ReadingStore>,
    air_quality_predictor: Option<Arc<dyn Predictor>>,
    activity_predictor: Option<Arc<dyn Predictor>>,
    thresholds: ThresholdTable,
}

impl Dashboard {
    pub fn new(store: Arc<dyn ReadingStore>, thresholds: ThresholdTable) -> Self {
        Self {
            store,
            air_quality_predictor: None,
            activity_predictor: None,
            thresholds,
        }
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.set_predictor(predictor);
        self
    }

    /// Installs the predictor in the slot matching its schema.
    pub fn set_predictor(&mut self, predictor: Arc<dyn Predictor>) {
        match predictor.schema() {
            FeatureSchema::AirQuality => self.air_quality_predictor = Some(predictor),
            FeatureSchema::Activity => self.activity_predictor = Some(predictor),
        }
    }

    pub fn has_predictor(&self, schema: FeatureSchema) -> bool {
        self.predictor(schema).is_some()
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    fn predictor(&self, schema: FeatureSchema) -> Option<&Arc<dyn Predictor>> {
        match schema {
            FeatureSchema::AirQuality => self.air_quality_predictor.as_ref(),
            FeatureSchema::Activity => self.activity_predictor.as_ref(),
        }
    }

    pub fn risk_map(&self, region: Option<&str>) -> Result<RiskMap, EngineError> {
        let readings = self.store.fetch_station_readings(region)?;
        let stations: Vec<RiskMapEntry> = readings
            .iter()
            .filter_map(|reading| self.risk_entry(reading))
            .collect();
        Ok(RiskMap {
            total_stations: stations.len(),
            stations,
        })
    }

    /// Latest valid reading for one station.
    pub fn station(&self, station_id: &str) -> Result<RiskMapEntry, EngineError> {
        let readings = self.store.fetch_station_readings(None)?;
        readings
            .iter()
            .filter(|reading| reading.station_id == station_id)
            .filter_map(|reading| self.risk_entry(reading))
            .max_by_key(|entry| entry.timestamp)
            .ok_or_else(|| EngineError::NotFound {
                entity: "station",
                id: station_id.to_string(),
            })
    }

    pub fn alerts(
        &self,
        severity: Option<Severity>,
        limit: Option<usize>,
    ) -> Result<AlertList, EngineError> {
        let readings = self.store.fetch_station_readings(None)?;
        let generated = self.thresholds.alert_generator().generate_station_alerts(&readings);
        let total_generated = generated.len();
        let alerts = rank_alerts(
            generated,
            AlertFilter {
                severity,
                limit: Some(resolve_limit(limit, DEFAULT_ALERT_LIMIT)?),
            },
        );
        debug!(total_generated, returned = alerts.len(), "Station alerts ranked");
        Ok(AlertList {
            alerts,
            total_generated,
        })
    }

    pub fn stats(&self) -> Result<AggregateStats, EngineError> {
        let readings = self.store.fetch_station_readings(None)?;
        let records = self.store.fetch_health_records(None, OffsetDateTime::UNIX_EPOCH)?;
        Ok(AggregateStats {
            air_quality: aggregate_station_stats(&readings, &self.thresholds.classifier()),
            health_metrics: aggregate_health_stats(&records),
        })
    }

    pub fn personal_alerts(
        &self,
        subject: Option<&str>,
        limit: Option<usize>,
    ) -> Result<PersonalAlerts, EngineError> {
        let records = self.store.fetch_health_records(subject, OffsetDateTime::UNIX_EPOCH)?;
        let generated = self.thresholds.alert_generator().generate_personal_alerts_for(&records);
        let total_generated = generated.len();
        let alerts = rank_alerts(
            generated,
            AlertFilter {
                severity: None,
                limit: Some(resolve_limit(limit, DEFAULT_PERSONAL_ALERT_LIMIT)?),
            },
        );
        Ok(PersonalAlerts {
            subject_id: subject.unwrap_or(ALL_SUBJECTS).to_string(),
            alerts,
            total_generated,
        })
    }

    /// Trend windows are anchored on the subject's latest record, not the wall clock.
    pub fn personal_trends(
        &self,
        subject: Option<&str>,
        metric: MetricSelector,
        days: u32,
    ) -> Result<PersonalTrends, EngineError> {
        if days == 0 {
            return Err(EngineError::invalid("days", "must be at least 1"));
        }
        let records: Vec<HealthRecord> = self
            .store
            .fetch_health_records(subject, OffsetDateTime::UNIX_EPOCH)?
            .into_iter()
            .filter(|record| match record.validate() {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        subject_id = %record.subject_id,
                        error = %err,
                        "Skipping invalid health record"
                    );
                    false
                }
            })
            .collect();

        let analyzer = self.thresholds.trend_analyzer();
        let trends = metric
            .metrics()
            .into_iter()
            .map(|metric| {
                let series: Vec<(OffsetDateTime, f64)> =
                    records.iter().map(|record| (record.timestamp, metric.value(record))).collect();
                (metric.name().to_string(), analyzer.analyze(metric.name(), &series, days))
            })
            .collect();

        let activity_distribution = match metric {
            MetricSelector::All => Some(activity_distribution(&records, days)),
            MetricSelector::One(_) => None,
        };

        Ok(PersonalTrends {
            subject_id: subject.unwrap_or(ALL_SUBJECTS).to_string(),
            period_days: days,
            trends,
            activity_distribution,
        })
    }

    /// Validates the features, runs the matching predictor and attaches the
    /// engine's interpretation of its output.
    pub fn predict(&self, features: &FeatureVector) -> Result<PredictionResult, EngineError> {
        features.validate()?;
        let schema = features.schema();
        let predictor = self.predictor(schema).ok_or_else(|| {
            EngineError::UpstreamUnavailable(format!("{schema} predictor not configured"))
        })?;
        let prediction = predictor.predict(features)?;

        match (schema, prediction.output) {
            (FeatureSchema::AirQuality, PredictionOutput::Value(aqi)) => {
                let risk_level = self.thresholds.classifier().classify(aqi).map_err(|_| {
                    EngineError::UpstreamUnavailable(format!(
                        "predictor returned out-of-range AQI {aqi}"
                    ))
                })?;
                Ok(PredictionResult::AirQuality(AirQualityPrediction {
                    predicted_aqi: aqi,
                    risk_level,
                    category: risk_level.category(),
                    health_concern: risk_level.health_concern(),
                    confidence: prediction.confidence,
                    model: predictor.name().to_string(),
                }))
            }
            (FeatureSchema::Activity, PredictionOutput::Label(label)) => {
                Ok(PredictionResult::Activity(ActivityPrediction {
                    predicted_activity: label,
                    confidence: prediction.confidence,
                    probabilities: prediction.probabilities,
                    model: predictor.name().to_string(),
                }))
            }
            (schema, output) => Err(EngineError::UpstreamUnavailable(format!(
                "{schema} predictor returned unexpected output {output:?}"
            ))),
        }
    }

    fn risk_entry(&self, reading: &StationReading) -> Option<RiskMapEntry> {
        let classified = reading
            .validate()
            .and_then(|()| self.thresholds.classifier().classify(reading.aqi));
        match classified {
            Ok(risk_level) => Some(RiskMapEntry {
                station_id: reading.station_id.clone(),
                region: reading.region.clone(),
                latitude: reading.latitude,
                longitude: reading.longitude,
                aqi: reading.aqi,
                risk_level,
                color: risk_level.color(),
                pollutants: reading.pollutants,
                timestamp: reading.timestamp,
            }),
            Err(err) => {
                warn!(
                    station_id = %reading.station_id,
                    error = %err,
                    "Skipping invalid station reading"
                );
                None
            }
        }
    }
}

fn resolve_limit(limit: Option<usize>, default: usize) -> Result<usize, EngineError> {
    match limit {
        Some(0) => Err(EngineError::invalid("limit", "must be at least 1")),
        Some(limit) => Ok(limit),
        None => Ok(default),
    }
}

fn activity_distribution(records: &[HealthRecord], days: u32) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    let Some(latest) = records.iter().map(|record| record.timestamp).max() else {
        return distribution;
    };
    let cutoff = window_start(latest, days);
    for label in records
        .iter()
        .filter(|record| cutoff.is_none_or(|cutoff| record.timestamp >= cutoff))
        .filter_map(|record| record.activity.as_deref())
    {
        *distribution.entry(label.to_string()).or_insert(0) += 1;
    }
    distribution
}
