//! HTTP error responses.
//!
//! Every client-facing failure is rendered as a JSON body. Simulated failures
//! are ordinary responses here; the handlers that raise them also record the
//! matching `app_errors_total{type}` series.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use faultbox_core::error::{ClientCode, FaultboxError};

#[derive(Debug)]
pub enum ApiError {
    /// `POST /error/rate` with a missing, non-numeric or out-of-range rate.
    InvalidRate,
    /// Lost a random trial against the current rate.
    RandomFailure { environment: String, error_rate: f64 },
    /// `GET /error/500`.
    Intentional { environment: String },
    NotFound { path: String },
    /// A real fault, not a simulation.
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRate => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::RandomFailure { .. } | ApiError::Intentional { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn client_code(&self) -> ClientCode {
        match self {
            ApiError::InvalidRate => ClientCode::InvalidRate,
            ApiError::RandomFailure { .. } | ApiError::Intentional { .. } => {
                ClientCode::SimulatedFailure
            }
            ApiError::NotFound { .. } => ClientCode::NotFound,
            ApiError::Internal(_) => ClientCode::Internal,
        }
    }
}

impl From<FaultboxError> for ApiError {
    fn from(e: FaultboxError) -> Self {
        match e {
            FaultboxError::InvalidRate(_) => ApiError::InvalidRate,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(
            status = status.as_u16(),
            code = self.client_code().as_str(),
            "error response"
        );
        let body = match self {
            ApiError::InvalidRate => json!({ "error": "Rate must be 0~1" }),
            ApiError::RandomFailure { environment, error_rate } => json!({
                "error": "Internal Server Error",
                "environment": environment,
                "errorRate": error_rate,
            }),
            ApiError::Intentional { environment } => json!({
                "error": "Intentional 500 error",
                "environment": environment,
            }),
            ApiError::NotFound { path } => json!({ "error": "Not Found", "path": path }),
            ApiError::Internal(msg) => {
                tracing::error!(%msg, "internal error");
                json!({ "error": "Internal Server Error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
