use crate::engine::risk::{RiskClassifier, RiskLevel};
use crate::engine::trend::mean;
use crate::records::{HealthRecord, StationReading};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationAggregate {
    pub total_stations: usize,
    pub average_aqi: Option<f64>,
    pub max_aqi: Option<f64>,
    pub high_risk_stations: usize,
    pub risk_percentage: f64,
    pub risk_distribution: BTreeMap<RiskLevel, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthAggregate {
    pub total_records: usize,
    pub average_heart_rate: Option<f64>,
    pub average_steps: Option<f64>,
    pub average_blood_oxygen: Option<f64>,
    pub activity_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats {
    pub air_quality: StationAggregate,
    pub health_metrics: HealthAggregate,
}

/// Invalid readings are skipped with a warning and excluded from every count.
pub fn aggregate_station_stats(
    readings: &[StationReading],
    classifier: &RiskClassifier,
) -> StationAggregate {
    let mut aqis = Vec::with_capacity(readings.len());
    let mut risk_distribution = BTreeMap::new();
    for reading in readings {
        let level = match reading.validate().and_then(|()| classifier.classify(reading.aqi)) {
            Ok(level) => level,
            Err(err) => {
                warn!(
                    station_id = %reading.station_id,
                    error = %err,
                    "Skipping invalid station reading"
                );
                continue;
            }
        };
        aqis.push(reading.aqi);
        *risk_distribution.entry(level).or_insert(0) += 1;
    }

    let total_stations = aqis.len();
    let high_risk_stations: usize = risk_distribution
        .iter()
        .filter(|(level, _)| level.is_high_risk())
        .map(|(_, count)| count)
        .sum();
    let risk_percentage = if total_stations == 0 {
        0.0
    } else {
        high_risk_stations as f64 / total_stations as f64 * 100.0
    };

    StationAggregate {
        total_stations,
        average_aqi: mean(&aqis),
        max_aqi: aqis.iter().copied().reduce(f64::max),
        high_risk_stations,
        risk_percentage,
        risk_distribution,
    }
}

pub fn aggregate_health_stats(records: &[HealthRecord]) -> HealthAggregate {
    let valid: Vec<&HealthRecord> = records
        .iter()
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

    let mut activity_distribution = BTreeMap::new();
    for label in valid.iter().filter_map(|record| record.activity.as_deref()) {
        *activity_distribution.entry(label.to_string()).or_insert(0) += 1;
    }

    HealthAggregate {
        total_records: valid.len(),
        average_heart_rate: column_mean(&valid, |record| record.heart_rate),
        average_steps: column_mean(&valid, |record| record.step_count),
        average_blood_oxygen: column_mean(&valid, |record| record.blood_oxygen),
        activity_distribution,
    }
}

fn column_mean(records: &[&HealthRecord], pick: impl Fn(&HealthRecord) -> f64) -> Option<f64> {
    let values: Vec<f64> = records.iter().map(|record| pick(*record)).collect();
    mean(&values)
}
