use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::response::{message_only, ok, ok_message, AppError};
use crate::routes::{json_body, parse_id};
use crate::services::colleges::{self, SearchQuery};
use crate::services::PageQuery;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/search", get(search))
        .route("/favorite", post(add_favorite))
        .route("/favorite/:id", delete(remove_favorite))
        .route("/user/favorites", get(favorites))
        .route("/compare", post(compare))
        .route("/:id", get(detail))
}

async fn list(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (colleges, pagination) = colleges::list(state.pool(), page).await?;
    Ok(ok(json!({
        "colleges": colleges,
        "pagination": pagination,
    })))
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (colleges, pagination) = colleges::search(state.pool(), &query).await?;
    Ok(ok(json!({
        "colleges": colleges,
        "pagination": pagination,
    })))
}

async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "College")?;
    Ok(ok(colleges::detail(state.pool(), id).await?))
}

#[derive(Debug, Default, Deserialize)]
struct FavoriteRequest {
    college_id: Option<i64>,
}

async fn add_favorite(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<FavoriteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let college_id = body
        .college_id
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::validation("Valid college id is required"))?;

    let favorite = colleges::add_favorite(state.pool(), &caller.id, college_id).await?;
    Ok((
        StatusCode::CREATED,
        ok_message("College added to favorites", favorite),
    ))
}

async fn remove_favorite(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let college_id = parse_id(&id, "Favorite")?;
    colleges::remove_favorite(state.pool(), &caller.id, college_id).await?;
    Ok(message_only("College removed from favorites"))
}

async fn favorites(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let favorites = colleges::favorites(state.pool(), &caller.id).await?;
    Ok(ok(json!({ "favorites": favorites })))
}

#[derive(Debug, Default, Deserialize)]
struct CompareRequest {
    #[serde(default)]
    college_ids: Vec<i64>,
}

async fn compare(
    State(state): State<AppState>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let comparison = colleges::compare(state.pool(), &body.college_ids).await?;
    Ok(ok(json!({ "comparison": comparison })))
}
