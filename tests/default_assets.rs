use airhealth_signals::config;
use airhealth_signals::engine::alerts::Severity;
use airhealth_signals::engine::facade::{Dashboard, MetricSelector};
use airhealth_signals::engine::risk::RiskLevel;
use airhealth_signals::engine::trend::TrendDirection;
use airhealth_signals::predictor::features::FeatureSchema;
use airhealth_signals::predictor::load_predictor_from_path;
use airhealth_signals::store::json::JsonDatasetStore;
use std::sync::Arc;

fn default_dashboard() -> Result<Dashboard, Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    let dataset = config.dataset_path().ok_or("default config has no dataset")?;
    let store = JsonDatasetStore::load_from_path(dataset)?;
    let mut dashboard = Dashboard::new(Arc::new(store), config.thresholds);
    for path in [config.air_quality_model_path(), config.activity_model_path()]
        .into_iter()
        .flatten()
    {
        dashboard.set_predictor(Arc::from(load_predictor_from_path(path)?));
    }
    Ok(dashboard)
}

#[test]
fn default_assets_load_both_predictors() -> Result<(), Box<dyn std::error::Error>> {
    let dashboard = default_dashboard()?;

    assert!(dashboard.has_predictor(FeatureSchema::AirQuality));
    assert!(dashboard.has_predictor(FeatureSchema::Activity));
    Ok(())
}

#[test]
fn sample_dataset_risk_map_and_alerts() -> Result<(), Box<dyn std::error::Error>> {
    let dashboard = default_dashboard()?;

    let north = dashboard.risk_map(Some("north"))?;
    let alerts = dashboard.alerts(None, None)?;

    assert_eq!(north.total_stations, 4);
    assert!(
        north
            .stations
            .iter()
            .any(|entry| entry.risk_level == RiskLevel::Unhealthy)
    );
    assert_eq!(alerts.alerts[0].severity, Severity::High);
    assert!(
        alerts
            .alerts
            .windows(2)
            .all(|pair| pair[0].severity >= pair[1].severity)
    );
    Ok(())
}

#[test]
fn sample_dataset_station_lookup_uses_latest_reading() -> Result<(), Box<dyn std::error::Error>> {
    let dashboard = default_dashboard()?;

    let station = dashboard.station("CHN-002")?;

    assert_eq!(station.aqi, 164.0);
    assert_eq!(station.risk_level, RiskLevel::Unhealthy);
    Ok(())
}

#[test]
fn sample_dataset_personal_signals() -> Result<(), Box<dyn std::error::Error>> {
    let dashboard = default_dashboard()?;

    let trends = dashboard.personal_trends(Some("U-1001"), MetricSelector::All, 7)?;
    let alerts = dashboard.personal_alerts(Some("U-1002"), None)?;

    assert_eq!(
        trends.trends["heart_rate"].direction,
        TrendDirection::Increasing
    );
    assert_eq!(trends.trends["heart_rate"].points.len(), 6);
    assert!(trends.activity_distribution.is_some());
    let kinds: Vec<&str> = alerts.alerts.iter().map(|alert| alert.kind.as_str()).collect();
    assert!(kinds.contains(&"Fever"));
    assert!(kinds.contains(&"Respiratory"));
    Ok(())
}

#[test]
fn sample_dataset_stats() -> Result<(), Box<dyn std::error::Error>> {
    let dashboard = default_dashboard()?;

    let stats = dashboard.stats()?;

    assert_eq!(stats.air_quality.total_stations, 8);
    assert_eq!(stats.health_metrics.total_records, 10);
    Ok(())
}
