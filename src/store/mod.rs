use crate::records::{HealthRecord, StationReading};
use thiserror::Error;
use time::OffsetDateTime;

pub mod json;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read dataset: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse dataset: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("reading store unavailable: {0}")]
    Unavailable(String),
}

/// Source of historical readings. Implementations return snapshots; callers
/// never write back.
pub trait ReadingStore: Send + Sync + std::fmt::Debug {
    /// Current station readings, optionally restricted to one region.
    fn fetch_station_readings(&self, region: Option<&str>)
    -> Result<Vec<StationReading>, StoreError>;

    /// Health records at or after `since`, ordered by timestamp.
    fn fetch_health_records(
        &self,
        subject: Option<&str>,
        since: OffsetDateTime,
    ) -> Result<Vec<HealthRecord>, StoreError>;
}
