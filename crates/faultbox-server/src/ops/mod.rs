//! Operational HTTP endpoints.
//!
//! - `/health`, `/healthz` : liveness with environment/version/timestamp
//! - `/api/info`           : environment, version, hostname, error rate
//! - `/api`                : service index
//! - `/metrics`            : Prometheus text format

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use faultbox_core::metrics::TEXT_CONTENT_TYPE;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::router::ENDPOINTS;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "environment": state.environment(),
        "version": state.version(),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "environment": state.environment(),
        "version": state.version(),
        "hostname": state.hostname(),
        "errorRate": state.faults().get_rate(),
    }))
}

pub async fn api_index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": state.cfg().server.service_name,
        "environment": state.environment(),
        "version": state.version(),
        "endpoints": ENDPOINTS,
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics().render();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
        body,
    )
        .into_response()
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound {
        path: uri.path().to_string(),
    }
}
