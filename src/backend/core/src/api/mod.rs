//! HTTP API for the goods service.
//!
//! Plain REST over Axum. Every failure renders as
//! `{"code": <u32>, "message": <key>, "details": <value>}` with the codes:
//!
//! | code | status | meaning |
//! |------|--------|---------|
//! | 1    | 400    | invalid input |
//! | 2    | 500    | internal failure |
//! | 3    | 404    | good not found |
//! | 4    | 409    | concurrent change, retry |

mod handlers;
pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, routing::get, Router};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::service::GoodsService;
use crate::telemetry::MetricsRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: GoodsService,
    pub metrics: MetricsRegistry,
}

impl AppState {
    pub fn new(service: GoodsService, metrics: MetricsRegistry) -> Self {
        Self { service, metrics }
    }
}

/// Build the API router with the default request timeout.
///
/// ```rust,ignore
/// let state = AppState::new(service, metrics);
/// let app = build_router(state);
/// ```
pub fn build_router(state: AppState) -> Router {
    build_router_with_config(state, &ServerConfig::default())
}

/// Build the API router using the server section of the configuration.
pub fn build_router_with_config(state: AppState, server: &ServerConfig) -> Router {
    build_router_with_timeout(state, server.request_timeout)
}

fn build_router_with_timeout(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest(routes::GOODS_PREFIX, routes::goods_router())
        .route_layer(axum_middleware::from_fn(middleware::track_metrics))
        .fallback(handlers::route_not_found)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
