use axum::{extract::State, http::StatusCode, Json};

use super::dto::{HealthState, HealthStatus};
use crate::AppState;

/// Relay health
///
/// 200 while tailing (push or pull), 503 when the relay is stopped or
/// disabled.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Relay is tailing", body = HealthStatus),
        (status = 503, description = "Relay is stopped", body = HealthStatus)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let relay = state.status.borrow().clone();
    let status = HealthState::from(relay.mode);

    let code = match status {
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    let body = HealthStatus {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        relay_enabled: state.relay_enabled,
        relay,
    };

    (code, Json(body))
}
