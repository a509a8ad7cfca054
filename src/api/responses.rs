use axum::http::StatusCode;
use serde::Serialize;

/// Success envelope: the payload's fields plus a response timestamp.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SuccessResponse<T> {
    #[serde(flatten)]
    pub data: T,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    UpstreamUnavailable,
    Unauthorized,
    InternalError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub service: String,
    pub air_quality_model: bool,
    pub activity_model: bool,
}

/// One row of the root index.
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
    pub query_params: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct ApiIndex {
    pub service: String,
    pub version: &'static str,
    pub endpoints: &'static [EndpointInfo],
}
