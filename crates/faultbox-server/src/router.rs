//! Axum router wiring.
//!
//! Each route gets a method fallback so an unsupported method on a known
//! path answers with the same 404 body as an unknown path. The request tap
//! is layered last so it observes every response, including fallbacks.

use axum::{
    middleware,
    routing::{get, MethodRouter},
    Router,
};

use crate::{app_state::AppState, faults, ops, tap};

/// Route list served by `GET /api`.
pub const ENDPOINTS: &[&str] = &[
    "GET  /health",
    "GET  /healthz",
    "GET  /api/info",
    "GET  /api/test",
    "POST /error/rate",
    "GET  /error/rate",
    "GET  /error/500",
    "GET  /error/cpu?duration=<ms>",
    "GET  /metrics",
];

fn or_not_found(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.fallback(ops::not_found)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", or_not_found(get(ops::health)))
        .route("/healthz", or_not_found(get(ops::health)))
        .route("/api", or_not_found(get(ops::api_index)))
        .route("/api/info", or_not_found(get(ops::info)))
        .route("/api/test", or_not_found(get(faults::random_test)))
        .route(
            "/error/rate",
            or_not_found(get(faults::get_rate).post(faults::set_rate)),
        )
        .route("/error/500", or_not_found(get(faults::forced_failure)))
        .route("/error/cpu", or_not_found(get(faults::cpu_burn)))
        .route("/metrics", or_not_found(get(ops::metrics)))
        .fallback(ops::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), tap::request_tap))
        .with_state(state)
}
