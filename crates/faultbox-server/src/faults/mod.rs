//! Error-simulation endpoints.
//!
//! - `GET/POST /error/rate` : read or replace the injected error rate
//! - `GET /api/test`        : one random trial against the rate
//! - `GET /error/500`       : unconditional failure
//! - `GET /error/cpu`       : busy-loop CPU burn on a blocking worker

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};

use faultbox_core::error::FailureKind;
use faultbox_core::fault::rate_from_body;
use faultbox_core::workload::{burn_cpu, parse_duration_ms};
use faultbox_core::RateSnapshot;

use crate::app_state::AppState;
use crate::error::ApiError;

pub async fn get_rate(State(state): State<AppState>) -> Json<RateSnapshot> {
    Json(state.faults().snapshot())
}

/// Body is read raw so that a missing or non-JSON body is reported as an
/// invalid rate (400) rather than an extractor rejection.
pub async fn set_rate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RateSnapshot>, ApiError> {
    let snap = rate_from_body(&body)
        .and_then(|rate| state.set_error_rate(rate))
        .map_err(|e| {
            tracing::warn!(error = %e, "rejected error rate update");
            ApiError::from(e)
        })?;

    tracing::info!(rate = snap.error_rate, percentage = %snap.percentage, "error rate updated");
    Ok(Json(snap))
}

pub async fn random_test(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let faults = state.faults();
    if faults.should_fail() {
        let rate = faults.get_rate();
        state.metrics().record_failure(FailureKind::Random);
        tracing::warn!(rate, "random failure triggered");
        return Err(ApiError::RandomFailure {
            environment: state.environment().to_string(),
            error_rate: rate,
        });
    }

    Ok(Json(json!({
        "status": "success",
        "environment": state.environment(),
        "errorRate": faults.get_rate(),
    })))
}

pub async fn forced_failure(State(state): State<AppState>) -> ApiError {
    state.metrics().record_failure(FailureKind::Forced);
    tracing::warn!("intentional 500 returned");
    ApiError::Intentional {
        environment: state.environment().to_string(),
    }
}

/// Query is taken as raw pairs so repeated or odd keys never reject the
/// request; the first `duration` wins.
pub async fn cpu_burn(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let requested = pairs
        .iter()
        .find(|(k, _)| k == "duration")
        .map(|(_, v)| v.as_str());
    let duration_ms = parse_duration_ms(requested);
    tracing::info!(duration_ms, "cpu burn started");

    let elapsed = tokio::task::spawn_blocking(move || burn_cpu(Duration::from_millis(duration_ms)))
        .await
        .map_err(|e| {
            state.metrics().record_internal_error();
            ApiError::Internal(format!("cpu burn worker failed: {e}"))
        })?;

    tracing::info!(duration_ms, elapsed_ms = elapsed.as_millis() as u64, "cpu burn completed");
    Ok(Json(json!({
        "message": "CPU spike completed",
        "duration": duration_ms,
    })))
}
