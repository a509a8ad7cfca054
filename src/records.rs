//! Immutable measurement records supplied by the reading store.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type StationId = String;
pub type SubjectId = String;

/// Pollutant concentrations measured at a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pollutants {
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub co: f64,
    pub o3: f64,
}

impl Pollutants {
    fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("pm25", self.pm25),
            ("pm10", self.pm10),
            ("no2", self.no2),
            ("so2", self.so2),
            ("co", self.co),
            ("o3", self.o3),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReading {
    pub station_id: StationId,
    #[serde(default)]
    pub region: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub pollutants: Pollutants,
    pub aqi: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl StationReading {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.station_id.trim().is_empty() {
            return Err(EngineError::invalid("station_id", "must not be empty"));
        }
        validate_coordinates(self.latitude, self.longitude)?;
        for (field, value) in self.pollutants.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::invalid(field, format!("{value} is not >= 0")));
            }
        }
        if !self.aqi.is_finite() || self.aqi < 0.0 {
            return Err(EngineError::invalid(
                "aqi",
                format!("{} is not >= 0", self.aqi),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub subject_id: SubjectId,
    #[serde(default)]
    pub record_id: Option<String>,
    pub heart_rate: f64,
    pub body_temperature: f64,
    pub blood_oxygen: f64,
    pub step_count: f64,
    pub bp_systolic: f64,
    pub bp_diastolic: f64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub activity: Option<String>,
}

impl HealthRecord {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.subject_id.trim().is_empty() {
            return Err(EngineError::invalid("subject_id", "must not be empty"));
        }
        if !self.heart_rate.is_finite() || self.heart_rate <= 0.0 {
            return Err(EngineError::invalid(
                "heart_rate",
                format!("{} bpm is not > 0", self.heart_rate),
            ));
        }
        if !self.body_temperature.is_finite() {
            return Err(EngineError::invalid("body_temperature", "must be finite"));
        }
        if !(0.0..=100.0).contains(&self.blood_oxygen) {
            return Err(EngineError::invalid(
                "blood_oxygen",
                format!("{}% is outside 0-100", self.blood_oxygen),
            ));
        }
        if !self.step_count.is_finite() || self.step_count < 0.0 {
            return Err(EngineError::invalid(
                "step_count",
                format!("{} is not >= 0", self.step_count),
            ));
        }
        if !self.bp_systolic.is_finite() || self.bp_systolic <= 0.0 {
            return Err(EngineError::invalid("bp_systolic", "must be > 0"));
        }
        if !self.bp_diastolic.is_finite() || self.bp_diastolic <= 0.0 {
            return Err(EngineError::invalid("bp_diastolic", "must be > 0"));
        }
        validate_coordinates(self.latitude, self.longitude)
    }
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), EngineError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(EngineError::invalid(
            "latitude",
            format!("{latitude} is outside -90..90"),
        ));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(EngineError::invalid(
            "longitude",
            format!("{longitude} is outside -180..180"),
        ));
    }
    Ok(())
}
