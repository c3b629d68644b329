//! HTTP tests for the goods API.
//!
//! Requests go through the full router (extractors, error rendering,
//! layers) with in-memory backends behind the service.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use goods_core::api::{build_router, AppState};
use goods_core::audit::AuditLogger;
use goods_core::bus::InMemoryBus;
use goods_core::cache::{GoodsCache, InMemoryBackend};
use goods_core::repository::InMemoryGoodsRepository;
use goods_core::service::GoodsService;
use goods_core::telemetry::MetricsRegistry;

// ============================================================================
// Helpers
// ============================================================================

fn app() -> Router {
    let service = GoodsService::new(
        Arc::new(InMemoryGoodsRepository::new()),
        GoodsCache::new(Arc::new(InMemoryBackend::new()), Duration::from_secs(60)),
        AuditLogger::new(Arc::new(InMemoryBus::new()), "goods.logs"),
    );
    build_router(AppState::new(service, MetricsRegistry::disabled()))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(app: &Router, project_id: i64, name: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/goods/create",
        Some(json!({"project_id": project_id, "name": name})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
}

// ============================================================================
// CRUD
// ============================================================================

#[tokio::test]
async fn test_create_then_get() {
    let app = app();
    let created = create(&app, 1, "widget").await;
    assert_eq!(created["priority"], 1);
    assert_eq!(created["removed"], false);

    let uri = format!("/goods/get/{}", created["id"]);
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "widget");
}

#[tokio::test]
async fn test_create_malformed_body_is_validation_error() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/goods/create",
        Some(json!({"name": "no project"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1);
    assert_eq!(body["message"], "errors.validation.failed");
}

#[tokio::test]
async fn test_get_invalid_id() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/goods/get/abc", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1);
    assert_eq!(body["details"], "invalid id");
}

#[tokio::test]
async fn test_get_missing_good() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/goods/get/77", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 3);
    assert_eq!(body["message"], "errors.common.notFound");
    assert_eq!(body["details"], json!({}));
}

#[tokio::test]
async fn test_update_changes_name() {
    let app = app();
    let created = create(&app, 1, "before").await;

    let uri = format!("/goods/update/{}", created["id"]);
    let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({"name": "after"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "after");
    assert_eq!(body["priority"], created["priority"]);

    let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({"name": " "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1);
}

#[tokio::test]
async fn test_remove_then_remove_again() {
    let app = app();
    let created = create(&app, 1, "short-lived").await;
    let uri = format!("/goods/remove/{}", created["id"]);

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 3);
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_defaults_and_meta() {
    let app = app();
    for i in 0..3 {
        create(&app, 1, &format!("g{}", i)).await;
    }
    send(&app, Method::DELETE, "/goods/remove/2", None).await;

    let (status, body) = send(&app, Method::GET, "/goods/list", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["meta"],
        json!({"total": 3, "removed": 1, "limit": 10, "offset": 0})
    );
    let ids: Vec<i64> = body["goods"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn test_list_rejects_bad_paging() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/goods/list?limit=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], "invalid limit");

    let (status, body) = send(&app, Method::GET, "/goods/list?offset=-1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], "invalid offset");
}

// ============================================================================
// Reprioritize
// ============================================================================

#[tokio::test]
async fn test_reprioritize_returns_changed_priorities() {
    let app = app();
    for i in 0..4 {
        create(&app, 1, &format!("g{}", i)).await;
    }

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/goods/reprioritize?id=4&projectId=1",
        Some(json!({"newPriority": 2})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["priorities"],
        json!([
            {"id": 4, "priority": 2},
            {"id": 2, "priority": 3},
            {"id": 3, "priority": 4}
        ])
    );
}

#[tokio::test]
async fn test_reprioritize_requires_project() {
    let app = app();
    create(&app, 1, "g").await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/goods/reprioritize?id=1",
        Some(json!({"newPriority": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], "invalid projectId");
}

#[tokio::test]
async fn test_reprioritize_rejects_zero_priority() {
    let app = app();
    create(&app, 1, "g").await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/goods/reprioritize?id=1&projectId=1",
        Some(json!({"newPriority": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1);
}

#[tokio::test]
async fn test_reprioritize_other_project_is_not_found() {
    let app = app();
    create(&app, 1, "g").await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/goods/reprioritize?id=1&projectId=9",
        Some(json!({"newPriority": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 3);
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/goods/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 3);
}
