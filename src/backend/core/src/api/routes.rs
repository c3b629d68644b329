//! Goods routes.

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::api::{handlers, AppState};

/// Prefix every goods route is mounted under.
pub const GOODS_PREFIX: &str = "/goods";

/// Build the goods router.
///
/// # Endpoints
///
/// - `POST /goods/create` - Create a good at the end of its project
/// - `GET /goods/get/:id` - Get a good (read-through cache)
/// - `PATCH /goods/update/:id` - Change name and/or description
/// - `DELETE /goods/remove/:id` - Soft delete
/// - `GET /goods/list?limit=&offset=` - Page through live goods
/// - `PATCH /goods/reprioritize?id=&projectId=` - Move a good within its project
pub fn goods_router() -> Router<AppState> {
    Router::new()
        .route("/create", post(handlers::create_good))
        .route("/get/:id", get(handlers::get_good))
        .route("/update/:id", patch(handlers::update_good))
        .route("/remove/:id", delete(handlers::remove_good))
        .route("/list", get(handlers::list_goods))
        .route("/reprioritize", patch(handlers::reprioritize_good))
}
