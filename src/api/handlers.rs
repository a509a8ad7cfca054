use crate::api::responses::{
    ApiIndex, EndpointInfo, ErrorCode, ErrorResponse, HealthStatus, ServiceHealth,
    SuccessResponse,
};
use crate::engine::alerts::Severity;
use crate::engine::facade::{
    AlertList, DEFAULT_TREND_DAYS, Dashboard, MetricSelector, PersonalAlerts, PersonalTrends,
    PredictionResult, RiskMap, RiskMapEntry,
};
use crate::engine::stats::AggregateStats;
use crate::error::EngineError;
use crate::predictor::features::{
    ActivityFeatures, AirQualityFeatures, FeatureSchema, FeatureVector,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, warn};

pub type SharedState = Arc<RwLock<AppState>>;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

const INDEX_ROUTE: &str = "/";
const HEALTH_ROUTE: &str = "/api/health";
const RISK_MAP_ROUTE: &str = "/api/health-authorities/risk-map";
const STATION_ROUTE: &str = "/api/health-authorities/stations";
const ALERTS_ROUTE: &str = "/api/health-authorities/alerts";
const STATS_ROUTE: &str = "/api/health-authorities/stats";
const PERSONAL_ALERTS_ROUTE: &str = "/api/citizens/personal-alerts";
const TRENDS_ROUTE: &str = "/api/citizens/trends";
const ACTIVITY_PREDICTION_ROUTE: &str = "/api/predict/activity";
const AIR_QUALITY_PREDICTION_ROUTE: &str = "/api/predict/air-quality";

const API_ENDPOINTS: &[EndpointInfo] = &[
    EndpointInfo {
        method: "GET",
        path: HEALTH_ROUTE,
        description: "Service and model availability",
        query_params: &[],
    },
    EndpointInfo {
        method: "GET",
        path: RISK_MAP_ROUTE,
        description: "Risk level for every station reading",
        query_params: &["region"],
    },
    EndpointInfo {
        method: "GET",
        path: "/api/health-authorities/stations/{station_id}",
        description: "Latest risk entry for one station",
        query_params: &[],
    },
    EndpointInfo {
        method: "GET",
        path: ALERTS_ROUTE,
        description: "Ranked air quality alerts",
        query_params: &["severity", "limit"],
    },
    EndpointInfo {
        method: "GET",
        path: STATS_ROUTE,
        description: "Aggregate air quality and health statistics",
        query_params: &[],
    },
    EndpointInfo {
        method: "GET",
        path: PERSONAL_ALERTS_ROUTE,
        description: "Ranked personal health alerts",
        query_params: &["user_id", "limit"],
    },
    EndpointInfo {
        method: "GET",
        path: TRENDS_ROUTE,
        description: "Personal health metric trends",
        query_params: &["user_id", "metric", "days"],
    },
    EndpointInfo {
        method: "POST",
        path: ACTIVITY_PREDICTION_ROUTE,
        description: "Classify activity from health features",
        query_params: &[],
    },
    EndpointInfo {
        method: "POST",
        path: "/api/citizens/predict-activity",
        description: "Alias of the activity prediction route",
        query_params: &[],
    },
    EndpointInfo {
        method: "POST",
        path: AIR_QUALITY_PREDICTION_ROUTE,
        description: "Predict AQI and its risk level from pollutant features",
        query_params: &[],
    },
];

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum ApiResponse<T> {
    Success(SuccessResponse<T>),
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RiskMapQuery {
    pub region: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub severity: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PersonalAlertsQuery {
    pub user_id: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendsQuery {
    pub user_id: Option<String>,
    pub metric: Option<String>,
    pub days: Option<String>,
}

pub async fn get_index(State(state): State<SharedState>) -> ApiResponse<ApiIndex> {
    build_index_response(&state, SystemTime::now())
}

pub async fn get_health(State(state): State<SharedState>) -> ApiResponse<ServiceHealth> {
    build_health_response(&state, SystemTime::now())
}

pub async fn get_risk_map(
    State(state): State<SharedState>,
    query: Result<Query<RiskMapQuery>, QueryRejection>,
) -> ApiResponse<RiskMap> {
    match query {
        Ok(Query(query)) => build_risk_map_response(&state, &query, SystemTime::now()),
        Err(rejection) => rejection_response(RISK_MAP_ROUTE, "query", rejection.body_text()),
    }
}

pub async fn get_station(
    State(state): State<SharedState>,
    Path(station_id): Path<String>,
) -> ApiResponse<RiskMapEntry> {
    build_station_response(&state, &station_id, SystemTime::now())
}

pub async fn get_alerts(
    State(state): State<SharedState>,
    query: Result<Query<AlertsQuery>, QueryRejection>,
) -> ApiResponse<AlertList> {
    match query {
        Ok(Query(query)) => build_alerts_response(&state, &query, SystemTime::now()),
        Err(rejection) => rejection_response(ALERTS_ROUTE, "query", rejection.body_text()),
    }
}

pub async fn get_stats(State(state): State<SharedState>) -> ApiResponse<AggregateStats> {
    build_stats_response(&state, SystemTime::now())
}

pub async fn get_personal_alerts(
    State(state): State<SharedState>,
    query: Result<Query<PersonalAlertsQuery>, QueryRejection>,
) -> ApiResponse<PersonalAlerts> {
    match query {
        Ok(Query(query)) => build_personal_alerts_response(&state, &query, SystemTime::now()),
        Err(rejection) => {
            rejection_response(PERSONAL_ALERTS_ROUTE, "query", rejection.body_text())
        }
    }
}

pub async fn get_trends(
    State(state): State<SharedState>,
    query: Result<Query<TrendsQuery>, QueryRejection>,
) -> ApiResponse<PersonalTrends> {
    match query {
        Ok(Query(query)) => build_trends_response(&state, &query, SystemTime::now()),
        Err(rejection) => rejection_response(TRENDS_ROUTE, "query", rejection.body_text()),
    }
}

pub async fn post_activity_prediction(
    State(state): State<SharedState>,
    body: Result<Json<ActivityFeatures>, JsonRejection>,
) -> ApiResponse<PredictionResult> {
    match body {
        Ok(Json(features)) => {
            run_prediction(
                &state,
                ACTIVITY_PREDICTION_ROUTE,
                FeatureVector::Activity(features),
            )
            .await
        }
        Err(rejection) => {
            rejection_response(ACTIVITY_PREDICTION_ROUTE, "body", rejection.body_text())
        }
    }
}

pub async fn post_air_quality_prediction(
    State(state): State<SharedState>,
    body: Result<Json<AirQualityFeatures>, JsonRejection>,
) -> ApiResponse<PredictionResult> {
    match body {
        Ok(Json(features)) => {
            run_prediction(
                &state,
                AIR_QUALITY_PREDICTION_ROUTE,
                FeatureVector::AirQuality(features),
            )
            .await
        }
        Err(rejection) => {
            rejection_response(AIR_QUALITY_PREDICTION_ROUTE, "body", rejection.body_text())
        }
    }
}

fn build_index_response(state: &SharedState, now: SystemTime) -> ApiResponse<ApiIndex> {
    let service = match state.read() {
        Ok(guard) => guard.service_name().to_string(),
        Err(_) => {
            return internal_error(INDEX_ROUTE, "state lock poisoned while reading service name");
        }
    };

    complete(
        INDEX_ROUTE,
        Ok(ApiIndex {
            service,
            version: env!("CARGO_PKG_VERSION"),
            endpoints: API_ENDPOINTS,
        }),
        now,
    )
}

fn build_health_response(state: &SharedState, now: SystemTime) -> ApiResponse<ServiceHealth> {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return internal_error(HEALTH_ROUTE, "state lock poisoned while reading predictors");
        }
    };
    let service = guard.service_name().to_string();
    let air_quality_model = guard.has_predictor(FeatureSchema::AirQuality);
    let activity_model = guard.has_predictor(FeatureSchema::Activity);
    drop(guard);

    let status = if air_quality_model && activity_model {
        HealthStatus::Ok
    } else {
        HealthStatus::Degraded
    };

    complete(
        HEALTH_ROUTE,
        Ok(ServiceHealth {
            status,
            service,
            air_quality_model,
            activity_model,
        }),
        now,
    )
}

fn build_risk_map_response(
    state: &SharedState,
    query: &RiskMapQuery,
    now: SystemTime,
) -> ApiResponse<RiskMap> {
    respond(state, RISK_MAP_ROUTE, now, |dashboard| {
        dashboard.risk_map(non_empty(query.region.as_deref()))
    })
}

fn build_station_response(
    state: &SharedState,
    station_id: &str,
    now: SystemTime,
) -> ApiResponse<RiskMapEntry> {
    respond(state, STATION_ROUTE, now, |dashboard| {
        dashboard.station(station_id)
    })
}

fn build_alerts_response(
    state: &SharedState,
    query: &AlertsQuery,
    now: SystemTime,
) -> ApiResponse<AlertList> {
    respond(state, ALERTS_ROUTE, now, |dashboard| {
        let severity = non_empty(query.severity.as_deref())
            .map(str::parse::<Severity>)
            .transpose()?;
        let limit = parse_limit(query.limit.as_deref())?;
        dashboard.alerts(severity, limit)
    })
}

fn build_stats_response(state: &SharedState, now: SystemTime) -> ApiResponse<AggregateStats> {
    respond(state, STATS_ROUTE, now, Dashboard::stats)
}

fn build_personal_alerts_response(
    state: &SharedState,
    query: &PersonalAlertsQuery,
    now: SystemTime,
) -> ApiResponse<PersonalAlerts> {
    respond(state, PERSONAL_ALERTS_ROUTE, now, |dashboard| {
        let limit = parse_limit(query.limit.as_deref())?;
        dashboard.personal_alerts(non_empty(query.user_id.as_deref()), limit)
    })
}

fn build_trends_response(
    state: &SharedState,
    query: &TrendsQuery,
    now: SystemTime,
) -> ApiResponse<PersonalTrends> {
    respond(state, TRENDS_ROUTE, now, |dashboard| {
        let metric = match non_empty(query.metric.as_deref()) {
            Some(metric) => metric.parse::<MetricSelector>()?,
            None => MetricSelector::All,
        };
        let days = match non_empty(query.days.as_deref()) {
            Some(days) => days.parse::<u32>().map_err(|_| {
                EngineError::invalid("days", format!("`{days}` is not a positive integer"))
            })?,
            None => DEFAULT_TREND_DAYS,
        };
        dashboard.personal_trends(non_empty(query.user_id.as_deref()), metric, days)
    })
}

/// Predictors may block on I/O, so they run on the blocking pool.
async fn run_prediction(
    state: &SharedState,
    route: &'static str,
    features: FeatureVector,
) -> ApiResponse<PredictionResult> {
    let dashboard = match snapshot_dashboard(state) {
        Ok(dashboard) => dashboard,
        Err(message) => return internal_error(route, message),
    };
    match tokio::task::spawn_blocking(move || dashboard.predict(&features)).await {
        Ok(outcome) => complete(route, outcome, SystemTime::now()),
        Err(err) => {
            error!(route, error = %err, "Prediction task failed");
            internal_error(route, "prediction task failed")
        }
    }
}

fn respond<T>(
    state: &SharedState,
    route: &'static str,
    now: SystemTime,
    operation: impl FnOnce(&Dashboard) -> Result<T, EngineError>,
) -> ApiResponse<T> {
    let dashboard = match snapshot_dashboard(state) {
        Ok(dashboard) => dashboard,
        Err(message) => return internal_error(route, message),
    };
    complete(route, operation(&dashboard), now)
}

fn snapshot_dashboard(state: &SharedState) -> Result<Dashboard, &'static str> {
    let guard = state
        .read()
        .map_err(|_| "state lock poisoned while reading dashboard")?;
    let dashboard = guard.dashboard().clone();
    drop(guard);
    Ok(dashboard)
}

fn complete<T>(
    route: &'static str,
    outcome: Result<T, EngineError>,
    now: SystemTime,
) -> ApiResponse<T> {
    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => return internal_error(route, "timestamp formatting failure"),
    };
    match outcome {
        Ok(data) => ApiResponse::Success(SuccessResponse { data, timestamp }),
        Err(err) => engine_error(route, err, timestamp),
    }
}

fn engine_error<T>(route: &'static str, err: EngineError, timestamp: String) -> ApiResponse<T> {
    let (error_code, field) = match &err {
        EngineError::InvalidInput { field, .. } => (ErrorCode::InvalidInput, Some(*field)),
        EngineError::NotFound { .. } => (ErrorCode::NotFound, None),
        EngineError::UpstreamUnavailable(_) => {
            warn!(route, error = %err, "Upstream unavailable");
            (ErrorCode::UpstreamUnavailable, None)
        }
    };
    ApiResponse::Error {
        status: error_code.status(),
        body: ErrorResponse {
            error_code,
            error_message: err.to_string(),
            field,
            timestamp,
        },
    }
}

fn rejection_response<T>(
    route: &'static str,
    field: &'static str,
    message: String,
) -> ApiResponse<T> {
    match format_timestamp(SystemTime::now()) {
        Ok(timestamp) => ApiResponse::Error {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error_code: ErrorCode::InvalidInput,
                error_message: message,
                field: Some(field),
                timestamp,
            },
        },
        Err(_) => internal_error(route, "timestamp formatting failure"),
    }
}

fn internal_error<T>(route: &'static str, message: &str) -> ApiResponse<T> {
    error!(message = message, route, "Internal error while handling request");
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            field: None,
            timestamp: timestamp_or_fallback(SystemTime::now()),
        },
    }
}

pub(crate) fn unauthorized_response(message: String, now: SystemTime) -> Response {
    let body = ErrorResponse {
        error_code: ErrorCode::Unauthorized,
        error_message: message,
        field: None,
        timestamp: timestamp_or_fallback(now),
    };
    (ErrorCode::Unauthorized.status(), Json(body)).into_response()
}

fn timestamp_or_fallback(now: SystemTime) -> String {
    format_timestamp(now).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    })
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_limit(raw: Option<&str>) -> Result<Option<usize>, EngineError> {
    non_empty(raw)
        .map(|limit| {
            limit.parse::<usize>().map_err(|_| {
                EngineError::invalid("limit", format!("`{limit}` is not a positive integer"))
            })
        })
        .transpose()
}
