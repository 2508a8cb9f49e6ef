//! Integration tests for the assembled application.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use campaign_api::ApiServer;
use campaign_core::random::FixedRandom;
use campaign_core::AppConfig;
use campaign_management::{ManagementState, ManagementStore};
use std::sync::Arc;
use tower::ServiceExt;

fn server() -> ApiServer {
    let config = AppConfig::default();
    let store = Arc::new(ManagementStore::with_demo_data());
    let management = ManagementState::new(&config, store, Arc::new(FixedRandom(0.5))).unwrap();
    ApiServer::new(config, management)
}

async fn get(server: &ApiServer, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = server.app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_health_reports_instance() {
    let server = server();
    let (status, body) = get(&server, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert!(json["instance_id"].is_string());
}

#[tokio::test]
async fn test_readiness_follows_startup() {
    let server = server();
    let (status, _) = get(&server, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    server.mark_ready();
    let (status, _) = get(&server, "/ready").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&server, "/live").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_management_routes_are_mounted() {
    let server = server();
    let (status, body) = get(&server, "/api/v1/management/campaigns").await;
    assert_eq!(status, StatusCode::OK);
    let campaigns: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(campaigns.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let server = server();
    let (status, _) = get(&server, "/api/v1/nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
