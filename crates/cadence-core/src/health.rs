use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;

/// Handler for `GET /healthz`, the liveness check.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Handler for `GET /readyz`.
pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

/// Router exposing only the two probe endpoints. Workers without an HTTP API
/// serve this on their health port.
pub fn health_router() -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
