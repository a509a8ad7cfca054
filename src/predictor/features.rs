//! Feature schemas accepted by the prediction capability.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSchema {
    AirQuality,
    Activity,
}

impl FeatureSchema {
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureSchema::AirQuality => "air_quality",
            FeatureSchema::Activity => "activity",
        }
    }

    /// Names produced by `FeatureVector::named_values` for this schema.
    pub fn feature_names(self) -> &'static [&'static str] {
        match self {
            FeatureSchema::AirQuality => &AIR_QUALITY_FEATURES,
            FeatureSchema::Activity => &ACTIVITY_FEATURES,
        }
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const AIR_QUALITY_FEATURES: [&str; 12] = [
    "pm25",
    "pm10",
    "no2",
    "so2",
    "co",
    "o3",
    "temp_c",
    "humidity",
    "wind_speed",
    "wind_direction",
    "pressure",
    "rain",
];

const ACTIVITY_FEATURES: [&str; 23] = [
    "heart_rate",
    "step_count",
    "body_temperature",
    "blood_oxygen",
    "latitude",
    "longitude",
    "bp_systolic",
    "bp_diastolic",
    "step_rate",
    "likely_running",
    "likely_walking",
    "likely_cycling",
    "likely_resting",
    "activity_intensity",
    "hr_to_steps",
    "bp_ratio",
    "bp_pulse",
    "hr_temp_interaction",
    "hr_bp_interaction",
    "intensity_score",
    "hour",
    "minute",
    "time_diff_minutes",
];

/// Sampling interval assumed for a single on-demand activity sample.
const DEFAULT_TIME_DIFF_MINUTES: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityFeatures {
    #[serde(alias = "PM25")]
    pub pm25: f64,
    #[serde(alias = "PM10")]
    pub pm10: f64,
    #[serde(alias = "NO2")]
    pub no2: f64,
    #[serde(alias = "SO2")]
    pub so2: f64,
    #[serde(alias = "CO")]
    pub co: f64,
    #[serde(alias = "O3")]
    pub o3: f64,
    #[serde(alias = "Temp_C")]
    pub temp_c: f64,
    #[serde(alias = "Humidity")]
    pub humidity: f64,
    #[serde(alias = "Wind_Speed")]
    pub wind_speed: f64,
    #[serde(alias = "Wind_Direction")]
    pub wind_direction: f64,
    #[serde(alias = "Pressure")]
    pub pressure: f64,
    #[serde(alias = "Rain")]
    pub rain: f64,
}

impl AirQualityFeatures {
    fn named_values(&self) -> Vec<(&'static str, f64)> {
        let values = [
            self.pm25,
            self.pm10,
            self.no2,
            self.so2,
            self.co,
            self.o3,
            self.temp_c,
            self.humidity,
            self.wind_speed,
            self.wind_direction,
            self.pressure,
            self.rain,
        ];
        AIR_QUALITY_FEATURES.iter().copied().zip(values).collect()
    }

    fn validate(&self) -> Result<(), EngineError> {
        for (name, value) in self.named_values() {
            if !value.is_finite() {
                return Err(EngineError::invalid(name, "must be finite"));
            }
        }
        let non_negative = [
            ("pm25", self.pm25),
            ("pm10", self.pm10),
            ("no2", self.no2),
            ("so2", self.so2),
            ("co", self.co),
            ("o3", self.o3),
            ("wind_speed", self.wind_speed),
            ("rain", self.rain),
        ];
        for (name, value) in non_negative {
            if value < 0.0 {
                return Err(EngineError::invalid(name, format!("{value} is not >= 0")));
            }
        }
        if !(0.0..=100.0).contains(&self.humidity) {
            return Err(EngineError::invalid("humidity", "must be within 0-100"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFeatures {
    #[serde(alias = "Heart_Rate")]
    pub heart_rate: f64,
    #[serde(alias = "Body_Temperature")]
    pub body_temperature: f64,
    #[serde(alias = "Blood_Oxygen")]
    pub blood_oxygen: f64,
    #[serde(alias = "Step_Count")]
    pub step_count: f64,
    #[serde(alias = "BP_Systolic")]
    pub bp_systolic: f64,
    #[serde(alias = "BP_Diastolic")]
    pub bp_diastolic: f64,
    #[serde(alias = "Latitude")]
    pub latitude: f64,
    #[serde(alias = "Longitude")]
    pub longitude: f64,
    #[serde(alias = "Timestamp")]
    pub timestamp: String,
}

impl ActivityFeatures {
    /// Accepts RFC 3339 or `YYYY-MM-DD HH:MM:SS` (interpreted as UTC).
    pub fn parsed_timestamp(&self) -> Result<OffsetDateTime, EngineError> {
        let raw = self.timestamp.trim();
        if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Ok(parsed);
        }
        let layout = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        PrimitiveDateTime::parse(raw, layout)
            .map(PrimitiveDateTime::assume_utc)
            .map_err(|err| {
                EngineError::invalid(
                    "timestamp",
                    format!("`{raw}` is not a valid timestamp: {err}"),
                )
            })
    }

    fn validate(&self) -> Result<(), EngineError> {
        let finite = [
            ("heart_rate", self.heart_rate),
            ("body_temperature", self.body_temperature),
            ("blood_oxygen", self.blood_oxygen),
            ("step_count", self.step_count),
            ("bp_systolic", self.bp_systolic),
            ("bp_diastolic", self.bp_diastolic),
            ("latitude", self.latitude),
            ("longitude", self.longitude),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(EngineError::invalid(name, "must be finite"));
            }
        }
        if self.heart_rate <= 0.0 {
            return Err(EngineError::invalid("heart_rate", "must be > 0"));
        }
        if self.step_count < 0.0 {
            return Err(EngineError::invalid("step_count", "must be >= 0"));
        }
        if !(0.0..=100.0).contains(&self.blood_oxygen) {
            return Err(EngineError::invalid("blood_oxygen", "must be within 0-100"));
        }
        self.parsed_timestamp().map(|_| ())
    }

    fn named_values(&self) -> Result<Vec<(&'static str, f64)>, EngineError> {
        let timestamp = self.parsed_timestamp()?;
        let hr = self.heart_rate;
        let steps = self.step_count;
        let flag = |condition: bool| if condition { 1.0 } else { 0.0 };

        let values = [
            hr,
            steps,
            self.body_temperature,
            self.blood_oxygen,
            self.latitude,
            self.longitude,
            self.bp_systolic,
            self.bp_diastolic,
            steps / DEFAULT_TIME_DIFF_MINUTES,
            flag(hr > 130.0 && steps > 600.0),
            flag((80.0..=120.0).contains(&hr) && (400.0..=800.0).contains(&steps)),
            flag(hr > 120.0 && steps > 650.0),
            flag(hr < 100.0 && steps < 500.0),
            if hr >= 130.0 { 2.0 } else { 1.0 },
            hr / (steps + 1.0),
            self.bp_systolic / (self.bp_diastolic + 1.0),
            self.bp_systolic - self.bp_diastolic,
            hr * self.body_temperature,
            hr * self.bp_systolic,
            (hr / 200.0) * 0.5 + (steps / 1000.0) * 0.5,
            f64::from(timestamp.hour()),
            f64::from(timestamp.minute()),
            DEFAULT_TIME_DIFF_MINUTES,
        ];
        Ok(ACTIVITY_FEATURES.iter().copied().zip(values).collect())
    }
}

/// Input to a predictor, tagged by schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureVector {
    AirQuality(AirQualityFeatures),
    Activity(ActivityFeatures),
}

impl FeatureVector {
    pub fn schema(&self) -> FeatureSchema {
        match self {
            FeatureVector::AirQuality(_) => FeatureSchema::AirQuality,
            FeatureVector::Activity(_) => FeatureSchema::Activity,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            FeatureVector::AirQuality(features) => features.validate(),
            FeatureVector::Activity(features) => features.validate(),
        }
    }

    /// Flattened, engineered feature values in `FeatureSchema::feature_names` order.
    pub fn named_values(&self) -> Result<Vec<(&'static str, f64)>, EngineError> {
        match self {
            FeatureVector::AirQuality(features) => Ok(features.named_values()),
            FeatureVector::Activity(features) => features.named_values(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn air_quality() -> AirQualityFeatures {
        AirQualityFeatures {
            pm25: 40.0,
            pm10: 80.0,
            no2: 25.0,
            so2: 6.0,
            co: 0.8,
            o3: 35.0,
            temp_c: 29.0,
            humidity: 65.0,
            wind_speed: 3.2,
            wind_direction: 180.0,
            pressure: 1008.0,
            rain: 0.0,
        }
    }

    pub fn activity(heart_rate: f64, step_count: f64) -> ActivityFeatures {
        ActivityFeatures {
            heart_rate,
            body_temperature: 36.9,
            blood_oxygen: 97.0,
            step_count,
            bp_systolic: 121.0,
            bp_diastolic: 79.0,
            latitude: 12.97,
            longitude: 80.22,
            timestamp: "2026-03-01T07:45:00Z".to_string(),
        }
    }
}
