//! Request tap: observes every request/response pair.
//!
//! Installed with `Router::layer` after all routes and the fallback, so it
//! wraps matched handlers, method fallbacks and the 404 fallback alike.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::app_state::AppState;

/// `route` label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

pub async fn request_tap(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_owned());
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed = started.elapsed();
    state
        .metrics()
        .record_request(method.as_str(), &route, status, elapsed);
    tracing::debug!(%method, %route, status, elapsed_ms = elapsed.as_millis() as u64, "request");

    response
}
