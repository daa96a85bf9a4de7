use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::chart::ChartData;
use crate::alerts::{AlertStatus, ThresholdConfig, ThresholdEvaluator};
use crate::data::{Reading, StoredRow};
use crate::query::{QueryError, QueryService, DEFAULT_HISTORY_HOURS};

/// Application state shared across handlers
pub struct AppState {
    pub query: Arc<QueryService>,
    /// Read-only here; the collector is the only caller of `evaluate`
    pub evaluator: Arc<ThresholdEvaluator>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Metrics
// ============================================================================

#[derive(Serialize)]
pub struct CurrentResponse {
    pub success: bool,
    pub data: Reading,
    pub timestamp: DateTime<Utc>,
}

pub async fn current_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CurrentResponse>, ApiError> {
    let reading = state.query.current().await.map_err(|e| {
        tracing::error!(error = %e, "Error fetching current metrics");
        ApiError::Internal("Failed to retrieve current metrics")
    })?;

    Ok(Json(CurrentResponse {
        success: true,
        data: reading,
        timestamp: Utc::now(),
    }))
}

#[derive(Deserialize)]
pub struct HistoryParams {
    /// Kept as text so a malformed value becomes our own 400 body
    pub hours: Option<String>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub raw: Vec<StoredRow>,
    pub formatted: ChartData,
}

pub async fn metrics_history(
    State(state): State<Arc<AppState>>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    // A query string axum cannot decode (e.g. a repeated `hours`) gets our own body
    let Query(params) = params.map_err(|_| hours_error())?;

    let hours = match params.hours.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_HISTORY_HOURS,
        Some(raw) => raw.parse::<i64>().map_err(|_| hours_error())?,
    };

    let rows = state.query.history(hours).map_err(|e| match e {
        QueryError::Validation(msg) => ApiError::BadRequest(msg),
        e => {
            tracing::error!(error = %e, "Error fetching metric history");
            ApiError::Internal("Failed to retrieve metric history")
        }
    })?;

    Ok(Json(HistoryResponse {
        success: true,
        formatted: ChartData::from_rows(&rows),
        raw: rows,
    }))
}

fn hours_error() -> ApiError {
    ApiError::BadRequest(format!(
        "Hours parameter must be between {} and {}",
        crate::query::MIN_HISTORY_HOURS,
        crate::query::MAX_HISTORY_HOURS
    ))
}

#[derive(Serialize)]
pub struct ChartResponse {
    pub success: bool,
    pub data: ChartData,
    pub timestamp: DateTime<Utc>,
}

/// `/metrics/current` reshaped as a single-point chart
pub async fn metrics_chart(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ChartResponse>, ApiError> {
    let reading = state.query.current().await.map_err(|e| {
        tracing::error!(error = %e, "Error fetching current metrics (alias)");
        ApiError::Internal("Failed to retrieve current metrics")
    })?;

    Ok(Json(ChartResponse {
        success: true,
        data: ChartData::from_reading(&reading),
        timestamp: Utc::now(),
    }))
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

pub async fn thresholds(State(state): State<Arc<AppState>>) -> Json<DataResponse<ThresholdConfig>> {
    Json(DataResponse {
        success: true,
        data: state.evaluator.thresholds(),
    })
}

pub async fn alert_status(State(state): State<Arc<AppState>>) -> Json<DataResponse<AlertStatus>> {
    Json(DataResponse {
        success: true,
        data: state.evaluator.status(),
    })
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    /// Bad input; the message is returned to the caller
    BadRequest(String),
    /// Internal failure; only a fixed message is returned
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string()),
        };

        let body = serde_json::json!({
            "success": false,
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
