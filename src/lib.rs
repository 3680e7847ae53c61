pub mod config;
pub mod discord;
pub mod domain;
pub mod monitor;
pub mod relay;
pub mod state;
pub mod store;
pub mod utils;

pub use state::AppState;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        domain::health::handler::health_check,
    ),
    components(
        schemas(
            domain::health::dto::HealthStatus,
            domain::health::dto::HealthState,
            relay::RelaySnapshot,
            relay::RelayStats,
            relay::TailingMode,
        )
    ),
    tags(
        (name = "Health", description = "Console relay status")
    )
)]
pub struct ApiDoc;

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(domain::health::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
