use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tenderdesk_core::health::HealthReport;

use crate::main_lib::AppState;

#[utoipa::path(get, path = "/api/v1/healthz", responses((status = 200, description = "Process is alive")))]
pub async fn healthz() -> &'static str {
    "ok"
}

/// Reports whether every required configuration key is set.
#[utoipa::path(get, path = "/api/v1/health", responses(
    (status = 200, description = "All required configuration present"),
    (status = 503, description = "Degraded; `warnings` lists the missing keys"),
))]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health_service.check(state.config_lookup.as_ref());
    let status =
        StatusCode::from_u16(report.status_code()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    (status, Json(report))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(health))
}
