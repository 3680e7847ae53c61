use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use console_relay::relay::{StatusBoard, TailingMode};
use console_relay::{app, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

// ===== Helper Functions =====

async fn parse_response_body(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn health_request() -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap()
}

// ===== Health Check Tests =====

mod health {
    use super::*;

    #[tokio::test]
    async fn should_report_healthy_in_push_mode() {
        // Arrange
        let board = StatusBoard::new();
        board.set_mode(TailingMode::Push);
        let app = app(AppState::new(board.subscribe(), true));

        // Act
        let response = app.oneshot(health_request()).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_response_body(response.into_body()).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["relay"]["mode"], "push");
        assert_eq!(body["relayEnabled"], true);
    }

    #[tokio::test]
    async fn should_report_degraded_in_pull_mode() {
        let board = StatusBoard::new();
        board.set_mode(TailingMode::Pull);
        board.update_stats(|s| s.forwarded = 3);
        let app = app(AppState::new(board.subscribe(), true));

        let response = app.oneshot(health_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_response_body(response.into_body()).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["relay"]["stats"]["forwarded"], 3);
    }

    #[tokio::test]
    async fn should_return_503_when_relay_is_stopped() {
        let board = StatusBoard::new();
        let app = app(AppState::new(board.subscribe(), false));

        let response = app.oneshot(health_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = parse_response_body(response.into_body()).await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["relayEnabled"], false);
    }
}

// ===== API Docs Tests =====

mod api_docs {
    use super::*;

    #[tokio::test]
    async fn should_serve_openapi_document() {
        let app = app(AppState::new(StatusBoard::new().subscribe(), false));

        let request = Request::builder()
            .method("GET")
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_response_body(response.into_body()).await;
        assert!(body["paths"]["/health"].is_object());
    }
}
