//! API request handlers.
//!
//! All handlers return `Result<impl IntoResponse, GoodsError>` so failures
//! become the structured `{code, message, details}` body through the
//! `IntoResponse` implementation on `GoodsError`. Malformed ids, query
//! strings and JSON bodies are rejected here, before the service is called.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::instrument;

use super::AppState;
use crate::error::GoodsError;
use crate::goods::{
    GoodCreate, GoodUpdate, ListParams, ListResponse, ReprioritizeRequest, ReprioritizeResponse,
    DEFAULT_LIST_LIMIT,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Input Parsing
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_id(raw: &str, field: &'static str) -> Result<i64, GoodsError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(GoodsError::validation(format!("invalid {}", field)).with_context(field, raw)),
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, GoodsError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| GoodsError::validation(rejection.body_text()))
}

fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, GoodsError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| GoodsError::validation(rejection.body_text()))
}

fn parse_paging(raw: Option<&str>, default: i64, field: &'static str) -> Result<i64, GoodsError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<i64>()
            .ok()
            .filter(|v| *v >= 0)
            .ok_or_else(|| GoodsError::validation(format!("invalid {}", field))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Goods Handlers
// ═══════════════════════════════════════════════════════════════════════════════

#[instrument(skip_all)]
pub async fn create_good(
    State(state): State<AppState>,
    body: Result<Json<GoodCreate>, JsonRejection>,
) -> Result<impl IntoResponse, GoodsError> {
    let input = json_body(body)?;
    let created = state.service.create(&input).await?;
    Ok((StatusCode::CREATED, Json(created.value)))
}

#[instrument(skip(state))]
pub async fn get_good(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GoodsError> {
    let id = parse_id(&id, "id")?;
    let good = state.service.get(id).await?;
    Ok(Json(good))
}

#[instrument(skip(state, body))]
pub async fn update_good(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<GoodUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, GoodsError> {
    let id = parse_id(&id, "id")?;
    let patch = json_body(body)?;
    let updated = state.service.update(id, &patch).await?;
    Ok(Json(updated.value))
}

#[instrument(skip(state))]
pub async fn remove_good(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GoodsError> {
    let id = parse_id(&id, "id")?;
    state.service.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    limit: Option<String>,
    offset: Option<String>,
}

#[instrument(skip(state))]
pub async fn list_goods(
    State(state): State<AppState>,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, GoodsError> {
    let params = query(params)?;
    let limit = parse_paging(params.limit.as_deref(), DEFAULT_LIST_LIMIT, "limit")?;
    let offset = parse_paging(params.offset.as_deref(), 0, "offset")?;
    let params = ListParams::new(limit, offset)?;

    let page = state.service.list(params).await?;
    Ok(Json(ListResponse::new(page, params)))
}

#[derive(Debug, Deserialize)]
pub struct ReprioritizeQuery {
    id: Option<String>,
    #[serde(rename = "projectId")]
    project_id: Option<String>,
}

#[instrument(skip(state, body))]
pub async fn reprioritize_good(
    State(state): State<AppState>,
    params: Result<Query<ReprioritizeQuery>, QueryRejection>,
    body: Result<Json<ReprioritizeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, GoodsError> {
    let params = query(params)?;
    let id = parse_id(params.id.as_deref().unwrap_or_default(), "id")?;
    let project_id = parse_id(params.project_id.as_deref().unwrap_or_default(), "projectId")?;
    let request = json_body(body)?;
    request.validate()?;

    let moved = state
        .service
        .reprioritize(id, project_id, request.new_priority)
        .await?;
    Ok(Json(ReprioritizeResponse::from(moved.value.as_slice())))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Operational Endpoints
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, health) = match state.service.ready().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            e.log();
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    (
        status,
        Json(serde_json::json!({
            "status": health,
            "store": state.service.store_name(),
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub async fn route_not_found(uri: Uri) -> GoodsError {
    GoodsError::not_found("Route", uri.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42", "id").unwrap(), 42);
        assert!(parse_id("0", "id").is_err());
        assert!(parse_id("-3", "id").is_err());
        assert!(parse_id("abc", "id").is_err());
        assert!(parse_id("", "id").is_err());
    }

    #[test]
    fn test_parse_paging() {
        assert_eq!(parse_paging(None, 10, "limit").unwrap(), 10);
        assert_eq!(parse_paging(Some(""), 10, "limit").unwrap(), 10);
        assert_eq!(parse_paging(Some("0"), 10, "limit").unwrap(), 0);
        assert_eq!(parse_paging(Some("25"), 10, "limit").unwrap(), 25);
        assert!(parse_paging(Some("-1"), 10, "limit").is_err());
        assert!(parse_paging(Some("ten"), 10, "limit").is_err());
    }
}
