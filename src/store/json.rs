//! In-memory reading store loaded from a JSON dataset file.
//!
//! The file holds two arrays, `stations` and `health_records`. Entries that
//! fail to deserialize are skipped with a warning so one bad row cannot
//! prevent the rest of the dataset from loading.

use crate::records::{HealthRecord, StationReading};
use crate::store::{ReadingStore, StoreError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use time::OffsetDateTime;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    stations: Vec<serde_json::Value>,
    #[serde(default)]
    health_records: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Clone)]
pub struct JsonDatasetStore {
    stations: Vec<StationReading>,
    health_records: Vec<HealthRecord>,
}

impl JsonDatasetStore {
    pub fn new(stations: Vec<StationReading>, mut health_records: Vec<HealthRecord>) -> Self {
        health_records.sort_by_key(|record| record.timestamp);
        Self {
            stations,
            health_records,
        }
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let store = Self::from_json_str(&contents)?;
        info!(
            path = %path.as_ref().display(),
            stations = store.stations.len(),
            health_records = store.health_records.len(),
            "Dataset loaded"
        );
        Ok(store)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, StoreError> {
        let file: DatasetFile = serde_json::from_str(contents)?;
        let stations = parse_entries(file.stations, "station");
        let health_records = parse_entries(file.health_records, "health record");
        Ok(Self::new(stations, health_records))
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn health_record_count(&self) -> usize {
        self.health_records.len()
    }
}

fn parse_entries<T: DeserializeOwned>(entries: Vec<serde_json::Value>, kind: &str) -> Vec<T> {
    let mut parsed = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value(entry) {
            Ok(value) => parsed.push(value),
            Err(err) => warn!(index, kind, error = %err, "Skipping malformed dataset entry"),
        }
    }
    parsed
}

impl ReadingStore for JsonDatasetStore {
    fn fetch_station_readings(
        &self,
        region: Option<&str>,
    ) -> Result<Vec<StationReading>, StoreError> {
        let readings = match region {
            Some(region) => self
                .stations
                .iter()
                .filter(|reading| {
                    reading
                        .region
                        .as_deref()
                        .is_some_and(|name| name.eq_ignore_ascii_case(region))
                })
                .cloned()
                .collect(),
            None => self.stations.clone(),
        };
        Ok(readings)
    }

    fn fetch_health_records(
        &self,
        subject: Option<&str>,
        since: OffsetDateTime,
    ) -> Result<Vec<HealthRecord>, StoreError> {
        Ok(self
            .health_records
            .iter()
            .filter(|record| record.timestamp >= since)
            .filter(|record| subject.is_none_or(|subject| record.subject_id == subject))
            .cloned()
            .collect())
    }
}
