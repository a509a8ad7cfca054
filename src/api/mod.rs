use crate::api::auth::AccessPolicy;
use crate::api::handlers::SharedState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod auth;
pub mod handlers;
pub mod responses;

/// `/` and `/api/health` stay public; everything else passes through `policy`.
/// CORS is permissive on every route.
pub fn router(state: SharedState, policy: Arc<dyn AccessPolicy>) -> Router {
    let protected = Router::new()
        .route(
            "/api/health-authorities/risk-map",
            get(handlers::get_risk_map),
        )
        .route(
            "/api/health-authorities/stations/{station_id}",
            get(handlers::get_station),
        )
        .route("/api/health-authorities/alerts", get(handlers::get_alerts))
        .route("/api/health-authorities/stats", get(handlers::get_stats))
        .route(
            "/api/citizens/personal-alerts",
            get(handlers::get_personal_alerts),
        )
        .route("/api/citizens/trends", get(handlers::get_trends))
        .route(
            "/api/citizens/predict-activity",
            post(handlers::post_activity_prediction),
        )
        .route(
            "/api/predict/activity",
            post(handlers::post_activity_prediction),
        )
        .route(
            "/api/predict/air-quality",
            post(handlers::post_air_quality_prediction),
        )
        .route_layer(middleware::from_fn_with_state(policy, auth::require_access));

    Router::new()
        .route("/", get(handlers::get_index))
        .route("/api/health", get(handlers::get_health))
        .merge(protected)
        .with_state(state)
        .layer(CorsLayer::permissive())
}
